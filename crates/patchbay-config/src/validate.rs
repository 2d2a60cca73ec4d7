//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::Invalid`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_id_prefix(&config.registry.id_prefix)?;
    validate_prefix("bridge.prefix", &config.bridge.prefix)?;
    validate_prefix("bridge.enabled_list_key", &config.bridge.enabled_list_key)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_prefix(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(invalid(
            field,
            &format!("'{value}' contains '{bad}'; only ASCII letters, digits, '_' and '-' are allowed"),
        ));
    }
    Ok(())
}

/// Injection ids are `<prefix>-<uuid>`, so the prefix itself may not hold
/// a `-` or start with `_`.
fn validate_id_prefix(value: &str) -> ConfigResult<()> {
    const FIELD: &str = "registry.id_prefix";
    validate_prefix(FIELD, value)?;
    if value.contains('-') {
        return Err(invalid(FIELD, &format!("'{value}' contains '-'")));
    }
    if value.starts_with('_') {
        return Err(invalid(FIELD, &format!("'{value}' starts with '_'")));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let logging = &config.logging;
    if !LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            &format!(
                "unsupported level '{}'; expected one of: {}",
                logging.level,
                LEVELS.join(", ")
            ),
        ));
    }
    if !FORMATS.contains(&logging.format.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            &format!(
                "unsupported format '{}'; expected one of: {}",
                logging.format,
                FORMATS.join(", ")
            ),
        ));
    }
    if let Some(empty) = logging.directives.iter().position(|d| d.trim().is_empty()) {
        return Err(invalid(
            "logging.directives",
            &format!("directive {empty} is empty"),
        ));
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let mut config = Config::default();
        config.registry.id_prefix = String::new();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "registry.id_prefix"));
    }

    #[test]
    fn test_dash_in_id_prefix_rejected() {
        let mut config = Config::default();
        config.registry.id_prefix = "patchbay-dev".to_owned();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Invalid { ref field, .. }) if field == "registry.id_prefix"
        ));

        config.registry.id_prefix = "patchbay_dev".to_owned();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_pipe_in_bridge_prefix_rejected() {
        let mut config = Config::default();
        config.bridge.prefix = "__pb|x".to_owned();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Invalid { ref field, .. }) if field == "bridge.prefix"
        ));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert!(validate(&config).is_err());

        config.logging.level = "DEBUG".to_owned();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }
}
