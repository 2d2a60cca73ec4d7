//! Patchbay CLI - edit desired state, switch modes and simulate page loads.
//!
//! Every invocation is a fresh coordinator process: it sweeps registrations
//! left by the previous run, restores them from the desired state, then
//! applies the command.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod app;
mod commands;
mod host;
mod theme;

use app::App;
use commands::modules::ConfigArgs;
use commands::{config, mode, modules, navigate, scope_arg, status, sweep};
use patchbay_core::{Mode, ModuleId};
use theme::Theme;

/// Patchbay - per-origin capability module coordinator
#[derive(Parser)]
#[command(name = "patchbay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra configuration file, merged over the user config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State file (overrides `store.path`)
    #[arg(long, global = true, env = "PATCHBAY_STATE_PATH")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ScopeArgs {
    /// Origin the change applies to (e.g. `example.com`)
    #[arg(long)]
    origin: Option<String>,

    /// Apply to the global scope instead
    #[arg(long)]
    global: bool,
}

#[derive(Args, Debug, Clone, Default)]
struct FieldArgs {
    /// Fixed override value (JSON or plain string)
    #[arg(long)]
    value: Option<String>,

    /// Capture predicate (JSON or plain string)
    #[arg(long)]
    flag: Option<String>,

    /// Capture parameters (JSON or plain string)
    #[arg(long)]
    param: Option<String>,

    /// Dynamic switch, `name=true|false` (repeatable)
    #[arg(long = "switch")]
    switches: Vec<String>,
}

impl From<FieldArgs> for ConfigArgs {
    fn from(args: FieldArgs) -> Self {
        Self {
            value: args.value,
            flag: args.flag,
            param: args.param,
            switches: args.switches,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Enable a module for a scope
    Enable {
        /// Module id
        module: ModuleId,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Defaults stored if the module has no configuration yet
        #[command(flatten)]
        defaults: FieldArgs,
    },

    /// Disable a module for a scope (its configuration is kept)
    Disable {
        /// Module id
        module: ModuleId,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Replace a module's configuration
    Configure {
        /// Module id
        module: ModuleId,
        #[command(flatten)]
        fields: FieldArgs,
        /// Delete the stored configuration instead
        #[arg(long, conflicts_with_all = ["value", "flag", "param", "switches"])]
        clear: bool,
    },

    /// Show or switch the mode
    Mode {
        /// `standard` or `global`
        mode: Option<Mode>,
    },

    /// Show mode, desired state and live registrations
    Status,

    /// Simulate a page load and show what each module received
    Navigate {
        /// Page URL or origin
        url: String,
    },

    /// Remove every patchbay registration from the host
    Sweep,

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = patchbay_config::Config::load(cli.config.as_deref())?;
    let log_config = app::log_config(&resolved.config, cli.verbose);
    if let Err(e) = patchbay_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Commands::Config = cli.command {
        return config::show(&resolved);
    }

    let app = App::open(&resolved.config, cli.state).await?;

    match cli.command {
        Commands::Sweep => sweep::run(&app).await,
        Commands::Navigate { url } => navigate::run(&app, &url).await,
        command => {
            let startup = app.coordinator.start().await?;
            if !startup.swept.failures.is_empty() {
                println!(
                    "{}",
                    Theme::warning(&format!(
                        "{} stale registration(s) could not be removed",
                        startup.swept.failures.len()
                    ))
                );
            }
            if startup.deferred {
                println!(
                    "{}",
                    Theme::warning("restoring registrations deferred until they are gone")
                );
            }
            run_coordinated(&app, command).await
        },
    }
}

async fn run_coordinated(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Enable {
            module,
            scope,
            defaults,
        } => {
            let scope = scope_arg(scope.origin.as_deref(), scope.global)?;
            modules::enable(app, scope, module, &defaults.into()).await
        },
        Commands::Disable { module, scope } => {
            let scope = scope_arg(scope.origin.as_deref(), scope.global)?;
            modules::disable(app, scope, module).await
        },
        Commands::Configure {
            module,
            fields,
            clear,
        } => modules::configure(app, module, &fields.into(), clear).await,
        Commands::Mode { mode } => mode::run(app, mode).await,
        Commands::Status => status::run(app).await,
        Commands::Navigate { .. } | Commands::Sweep | Commands::Config => Ok(()),
    }
}
