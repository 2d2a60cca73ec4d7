//! Enable, disable and configure modules.

use anyhow::{Result, bail};
use serde_json::Value;

use patchbay_core::{DesiredStateChange, ModuleConfig, ModuleId, Scope};

use crate::app::App;
use crate::commands::print_reconcile;
use crate::theme::Theme;

/// Config fields given on the command line.
#[derive(Debug, Default, Clone)]
pub(crate) struct ConfigArgs {
    pub(crate) value: Option<String>,
    pub(crate) flag: Option<String>,
    pub(crate) param: Option<String>,
    pub(crate) switches: Vec<String>,
}

impl ConfigArgs {
    /// Build a config record, or `None` if no field was given.
    pub(crate) fn to_config(&self) -> Result<Option<ModuleConfig>> {
        let mut config = ModuleConfig {
            value: self.value.as_deref().map(parse_value),
            flag: self.flag.as_deref().map(parse_value),
            param: self.param.as_deref().map(parse_value),
            ..ModuleConfig::default()
        };
        for switch in &self.switches {
            let Some((name, on)) = switch.split_once('=') else {
                bail!("switch '{switch}' must look like name=true");
            };
            let on: bool = on
                .parse()
                .map_err(|_| anyhow::anyhow!("switch '{name}' must be true or false"))?;
            config = config.with_switch(name, on);
        }
        Ok(config.is_deliverable().then_some(config))
    }
}

/// JSON if it parses, else the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub(crate) async fn enable(
    app: &App,
    scope: Scope,
    module: ModuleId,
    defaults: &ConfigArgs,
) -> Result<()> {
    let defaults = defaults.to_config()?;
    if app
        .store
        .enable_module(&scope, &module, defaults.as_ref())
        .await?
    {
        println!("{}", Theme::success(&format!("enabled {module} on {scope}")));
    } else {
        println!("{}", Theme::info(&format!("{module} was already enabled on {scope}")));
    }
    apply(app, scope).await
}

pub(crate) async fn disable(app: &App, scope: Scope, module: ModuleId) -> Result<()> {
    if app.store.disable_module(&scope, &module).await? {
        println!("{}", Theme::success(&format!("disabled {module} on {scope}")));
    } else {
        println!("{}", Theme::info(&format!("{module} was not enabled on {scope}")));
    }
    apply(app, scope).await
}

/// Replace (or with `clear`, delete) a module's stored configuration.
pub(crate) async fn configure(
    app: &App,
    module: ModuleId,
    fields: &ConfigArgs,
    clear: bool,
) -> Result<()> {
    if clear {
        if app.store.delete_module_config(&module).await? {
            println!("{}", Theme::success(&format!("cleared configuration of {module}")));
        } else {
            println!("{}", Theme::info(&format!("{module} had no configuration")));
        }
        return Ok(());
    }
    let Some(config) = fields.to_config()? else {
        bail!("give at least one of --value, --flag, --param or --switch");
    };
    app.store.set_module_config(&module, &config).await?;
    println!("{}", Theme::success(&format!("configured {module}")));
    for field in config.bridge_fields() {
        println!("  {} = {}", field.name, field.value);
    }
    Ok(())
}

async fn apply(app: &App, scope: Scope) -> Result<()> {
    let change = DesiredStateChange {
        new_module_ids: app.store.desired(&scope).await?,
        scope_key: scope,
    };
    match app.coordinator.apply_change(&change).await? {
        Some(report) => print_reconcile(&report),
        None => println!(
            "{}",
            Theme::warning(&format!(
                "{} is deferred in {} mode; applied once it is active and stale registrations are gone",
                change.scope_key,
                app.store.mode().await?
            ))
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_fields_means_no_config() {
        assert!(ConfigArgs::default().to_config().unwrap().is_none());
    }

    #[test]
    fn test_fields_parse_as_json_or_string() {
        let args = ConfigArgs {
            flag: Some("1".to_owned()),
            param: Some(r#"["x","y"]"#.to_owned()),
            value: Some("Mozilla/5.0".to_owned()),
            switches: vec!["breakpoint=true".to_owned()],
        };
        let config = args.to_config().unwrap().unwrap();
        assert_eq!(config.flag, Some(json!(1)));
        assert_eq!(config.param, Some(json!(["x", "y"])));
        assert_eq!(config.value, Some(json!("Mozilla/5.0")));
        assert_eq!(config.switches.get("breakpoint"), Some(&true));
    }

    #[test]
    fn test_bad_switch_rejected() {
        let args = ConfigArgs {
            switches: vec!["breakpoint".to_owned()],
            ..ConfigArgs::default()
        };
        assert!(args.to_config().is_err());
    }
}
