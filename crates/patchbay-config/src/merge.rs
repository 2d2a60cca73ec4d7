//! Deep merge of TOML layers.
//!
//! Merging happens on raw [`toml::Value`] trees before deserialization, so a
//! key missing from an overlay never resets the base layer's value.

use std::collections::HashMap;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.patchbay/config.toml`).
    User,
    /// A file named on the command line.
    Explicit,
    /// Environment variable override.
    Environment,
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.patchbay/config.toml)"),
            Self::Explicit => write!(f, "explicit file"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each leaf field, keyed by dotted path.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per key. Scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val, &path, layer, sources);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Record every leaf under `val` as coming from `layer`.
pub fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_missing_key_keeps_base() {
        let mut base = parse(
            r#"
            [bridge]
            prefix = "__patchbay"
            enabled_list_key = "enabled"
        "#,
        );
        let overlay = parse(
            r#"
            [bridge]
            prefix = "__pb"
        "#,
        );
        let mut sources = FieldSources::new();
        deep_merge(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["bridge"]["prefix"].as_str(), Some("__pb"));
        assert_eq!(base["bridge"]["enabled_list_key"].as_str(), Some("enabled"));
        assert_eq!(sources.get("bridge.prefix"), Some(&ConfigLayer::User));
        assert!(!sources.contains_key("bridge.enabled_list_key"));
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = parse(r#"logging = { directives = ["a=debug", "b=trace"] }"#);
        let overlay = parse(r#"logging = { directives = ["c=warn"] }"#);
        let mut sources = FieldSources::new();
        deep_merge(&mut base, &overlay, "", &ConfigLayer::Explicit, &mut sources);

        let directives = base["logging"]["directives"].as_array().unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(
            sources.get("logging.directives"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn test_new_table_records_all_leaves() {
        let mut base = parse("[registry]\nall_frames = false");
        let overlay = parse("[store]\npath = \"/tmp/state.json\"");
        let mut sources = FieldSources::new();
        deep_merge(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["store"]["path"].as_str(), Some("/tmp/state.json"));
        assert_eq!(sources.get("store.path"), Some(&ConfigLayer::User));
    }
}
