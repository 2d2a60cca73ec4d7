//! Environment variable overrides.
//!
//! Unlike file layers, these always win: a variable that is set replaces
//! whatever the files said.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Overrides the directory holding the user config file.
pub const HOME_VAR: &str = "PATCHBAY_HOME";

struct EnvMapping {
    var_name: &'static str,
    section: &'static str,
    field: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "PATCHBAY_LOG_LEVEL",
        section: "logging",
        field: "level",
    },
    EnvMapping {
        var_name: "PATCHBAY_BRIDGE_PREFIX",
        section: "bridge",
        field: "prefix",
    },
    EnvMapping {
        var_name: "PATCHBAY_STATE_PATH",
        section: "store",
        field: "path",
    },
];

/// Snapshot of the `PATCHBAY_*` variables of this process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("PATCHBAY_"))
        .collect()
}

/// Apply every mapped variable present in `env_vars` to `merged`.
///
/// Empty values are ignored. Returns the number of overrides applied.
pub fn apply_env_overrides<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;
    let Some(root) = merged.as_table_mut() else {
        return count;
    };

    for mapping in ENV_MAPPINGS {
        let Some(val) = env_vars.get(mapping.var_name).filter(|v| !v.is_empty()) else {
            continue;
        };
        let section = root
            .entry(mapping.section)
            .or_insert(toml::Value::Table(toml::Table::new()));
        let Some(table) = section.as_table_mut() else {
            continue;
        };
        debug!(var = mapping.var_name, "applying env var override");
        table.insert(mapping.field.to_owned(), toml::Value::String(val.clone()));
        sources.insert(
            format!("{}.{}", mapping.section, mapping.field),
            ConfigLayer::Environment,
        );
        count = count.saturating_add(1);
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_replaces_file_value() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"").unwrap();
        let mut sources = FieldSources::new();
        let env = HashMap::from([("PATCHBAY_LOG_LEVEL".to_owned(), "debug".to_owned())]);

        let count = apply_env_overrides(&mut merged, &mut sources, &env);

        assert_eq!(count, 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_creates_missing_section() {
        let mut merged = toml::Value::Table(toml::Table::new());
        let mut sources = FieldSources::new();
        let env = HashMap::from([(
            "PATCHBAY_STATE_PATH".to_owned(),
            "/var/lib/patchbay.json".to_owned(),
        )]);

        apply_env_overrides(&mut merged, &mut sources, &env);

        assert_eq!(
            merged["store"]["path"].as_str(),
            Some("/var/lib/patchbay.json")
        );
    }

    #[test]
    fn test_empty_value_ignored() {
        let mut merged: toml::Value = toml::from_str("[bridge]\nprefix = \"__patchbay\"").unwrap();
        let mut sources = FieldSources::new();
        let env = HashMap::from([("PATCHBAY_BRIDGE_PREFIX".to_owned(), String::new())]);

        assert_eq!(apply_env_overrides(&mut merged, &mut sources, &env), 0);
        assert_eq!(merged["bridge"]["prefix"].as_str(), Some("__patchbay"));
    }
}
