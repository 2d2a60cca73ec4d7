//! Remove every patchbay registration from the host.

use anyhow::Result;

use crate::app::App;
use crate::commands::print_failures;
use crate::theme::Theme;

pub(crate) async fn run(app: &App) -> Result<()> {
    let report = app.coordinator.reconciler().startup_sweep().await;

    if report.cleared() == 0 && report.failures.is_empty() {
        println!("{}", Theme::info("nothing to sweep"));
        return Ok(());
    }
    for id in &report.removed {
        println!("{}", Theme::success(&format!("removed {id}")));
    }
    for id in &report.already_gone {
        println!("{}", Theme::dimmed(&format!("{id} was already gone")));
    }
    print_failures(&report.failures);
    println!(
        "{}",
        Theme::dimmed("desired state is untouched; the next command restores it")
    );
    Ok(())
}
