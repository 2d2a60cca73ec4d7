//! Mode, desired state and live registrations.

use anyhow::{Result, bail};

use patchbay_coordinator::{CommandResponse, CoordinatorCommand};

use crate::app::App;
use crate::theme::Theme;

pub(crate) async fn run(app: &App) -> Result<()> {
    let CommandResponse::Status {
        mode,
        registrations,
    } = app.coordinator.handle(CoordinatorCommand::Status).await?
    else {
        bail!("coordinator did not answer the status command");
    };

    println!("\n{}", Theme::header("Patchbay Status"));
    println!("{}", Theme::separator());
    println!("  Mode:       {}", Theme::mode(mode));
    println!("  State file: {}", app.state_path.display());

    println!("\n{}", Theme::header("Desired"));
    let scopes = app.store.scopes().await?;
    if scopes.is_empty() {
        println!("  {}", Theme::dimmed("(no scopes)"));
    }
    for scope in scopes {
        let ids = app.store.desired_or_empty(&scope).await?;
        let list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let line = format!("  {:<28} [{list}]", scope.to_string());
        if scope.family() == mode {
            println!("{line}");
        } else {
            println!("{}", Theme::dimmed(&format!("{line} (inactive)")));
        }
    }

    println!("\n{}", Theme::header("Live registrations"));
    if registrations.is_empty() {
        println!("  {}", Theme::dimmed("(none)"));
    }
    for reg in &registrations {
        println!(
            "  {:<12} {:<24} {}",
            reg.module_id().to_string(),
            reg.match_pattern.as_host_pattern(),
            Theme::dimmed(reg.injection_id.as_str())
        );
    }

    let host_count = app.host.registrations().await?.len();
    if host_count != registrations.len() {
        println!(
            "\n{}",
            Theme::warning(&format!(
                "host holds {host_count} registration(s), registry tracks {}",
                registrations.len()
            ))
        );
    }
    println!();
    Ok(())
}
