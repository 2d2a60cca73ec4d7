//! Show or switch the mode.

use anyhow::{Result, bail};

use patchbay_coordinator::{CommandResponse, CoordinatorCommand};
use patchbay_core::Mode;

use crate::app::App;
use crate::theme::Theme;

pub(crate) async fn run(app: &App, requested: Option<Mode>) -> Result<()> {
    let Some(requested_mode) = requested else {
        println!("Mode: {}", Theme::mode(app.store.mode().await?));
        return Ok(());
    };

    match app
        .coordinator
        .handle(CoordinatorCommand::ToggleMode { requested_mode })
        .await?
    {
        CommandResponse::ModeChanged {
            from,
            to,
            swept,
            registered,
            deferred,
        } => {
            println!(
                "{}",
                Theme::success(&format!(
                    "switched {} → {}",
                    Theme::mode(from),
                    Theme::mode(to)
                ))
            );
            println!(
                "{}",
                Theme::dimmed(&format!(
                    "  {swept} registration(s) swept, {registered} registered"
                ))
            );
            if deferred {
                println!(
                    "{}",
                    Theme::warning("  old registrations are still live; new ones deferred")
                );
            }
        },
        CommandResponse::ModeUnchanged { mode } => {
            println!("{}", Theme::info(&format!("already in {} mode", Theme::mode(mode))));
        },
        other => bail!("unexpected coordinator response: {other:?}"),
    }
    Ok(())
}
