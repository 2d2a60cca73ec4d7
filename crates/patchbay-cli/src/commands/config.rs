//! Show the resolved configuration and where each value came from.

use anyhow::Result;

use patchbay_config::ResolvedConfig;

use crate::theme::Theme;

pub(crate) fn show(resolved: &ResolvedConfig) -> Result<()> {
    let c = &resolved.config;
    let state_path = c
        .store
        .resolve_path()
        .map_or_else(|e| format!("<{e}>"), |p| p.display().to_string());

    let rows = [
        ("registry.id_prefix", c.registry.id_prefix.clone()),
        ("registry.all_frames", c.registry.all_frames.to_string()),
        ("bridge.prefix", c.bridge.prefix.clone()),
        ("bridge.enabled_list_key", c.bridge.enabled_list_key.clone()),
        ("store.path", state_path),
        ("logging.level", c.logging.level.clone()),
        ("logging.format", c.logging.format.clone()),
        ("logging.directives", format!("{:?}", c.logging.directives)),
    ];

    println!("\n{}", Theme::header("Configuration"));
    println!("{}", Theme::separator());
    for (field, value) in rows {
        println!(
            "  {field:<24} = {value:<28} {}",
            Theme::dimmed(&resolved.source_of(field).to_string())
        );
    }

    if resolved.loaded_files.is_empty() {
        println!("\n{}", Theme::dimmed("no config files found; using defaults"));
    } else {
        println!("\n{}", Theme::header("Files"));
        for path in &resolved.loaded_files {
            println!("  {}", path.display());
        }
    }
    println!();
    Ok(())
}
