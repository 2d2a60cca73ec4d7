//! Config file discovery and layered loading.
//!
//! 1. Parse embedded `defaults.toml`
//! 2. Merge the user file (`$PATCHBAY_HOME/config.toml`, else
//!    `~/.patchbay/config.toml`)
//! 3. Merge the explicit file, if one was named
//! 4. Apply `PATCHBAY_*` environment overrides
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{HOME_VAR, apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge, record_leaves};
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration plus where its values came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Layer that set each leaf field, keyed by dotted path.
    pub field_sources: FieldSources,
    /// Files that were read, in merge order.
    pub loaded_files: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// The layer that set `field`, defaulting to [`ConfigLayer::Defaults`].
    #[must_use]
    pub fn source_of(&self, field: &str) -> &ConfigLayer {
        self.field_sources
            .get(field)
            .unwrap_or(&ConfigLayer::Defaults)
    }
}

/// Load with the full precedence chain, reading the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, or the
/// merged configuration fails validation.
pub fn load(explicit: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(explicit, None, &collect_env_vars())
}

/// Load with an explicit user directory and environment snapshot.
///
/// `user_dir` is the directory holding the user `config.toml`; when `None`
/// it comes from `PATCHBAY_HOME` in `env_vars`, else `~/.patchbay`.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: BuildHasher>(
    explicit: Option<&Path>,
    user_dir: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let user_dir = match user_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => default_user_dir(env_vars),
    };
    if let Some(dir) = user_dir {
        let path = dir.join("config.toml");
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::User,
                &mut field_sources,
            );
            info!(path = %path.display(), "loaded user config");
            loaded_files.push(path);
        }
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.to_path_buf());
    }

    let env_count = apply_env_overrides(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

fn default_user_dir<S: BuildHasher>(env_vars: &HashMap<String, String, S>) -> Option<PathBuf> {
    if let Some(home) = env_vars.get(HOME_VAR).filter(|h| !h.is_empty()) {
        return Some(PathBuf::from(home));
    }
    let dir = directories::BaseDirs::new().map(|d| d.home_dir().join(".patchbay"));
    if dir.is_none() {
        debug!("no home directory; skipping user config");
    }
    dir
}

/// Read and parse `path`, or `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}
