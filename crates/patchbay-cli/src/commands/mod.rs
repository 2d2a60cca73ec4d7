//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod mode;
pub(crate) mod modules;
pub(crate) mod navigate;
pub(crate) mod status;
pub(crate) mod sweep;

use anyhow::{Result, bail};

use patchbay_coordinator::{HostFailure, ReconcileReport};
use patchbay_core::Scope;

use crate::theme::Theme;

/// The scope named by `--origin <origin>` or `--global`.
pub(crate) fn scope_arg(origin: Option<&str>, global: bool) -> Result<Scope> {
    match (origin, global) {
        (Some(_), true) => bail!("--origin and --global are mutually exclusive"),
        (None, true) => Ok(Scope::Global),
        (Some(origin), false) => Ok(Scope::from_parts(origin, false)?),
        (None, false) => bail!("name a scope with --origin <origin> or --global"),
    }
}

/// Print what a reconcile did.
pub(crate) fn print_reconcile(report: &ReconcileReport) {
    for reg in &report.registered {
        println!(
            "{}",
            Theme::success(&format!(
                "registered {} for {} ({})",
                reg.module_id(),
                report.scope,
                reg.injection_id
            ))
        );
    }
    for id in &report.unregistered {
        println!("{}", Theme::success(&format!("unregistered {id}")));
    }
    print_failures(&report.failures);
    if !report.changed() && report.failures.is_empty() {
        println!("{}", Theme::dimmed("registrations already up to date"));
    }
}

/// Print host failures.
pub(crate) fn print_failures(failures: &[HostFailure]) {
    for failure in failures {
        let module = failure
            .module_id
            .as_ref()
            .map_or_else(String::new, |m| format!("{m} "));
        println!(
            "{}",
            Theme::error(&format!(
                "{module}{}: {}",
                failure.injection_id, failure.error
            ))
        );
    }
}
