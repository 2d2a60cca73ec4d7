//! Configuration struct definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// File name of the JSON state file inside the data directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Script registration settings.
    pub registry: RegistrySection,
    /// Page-visible key layout.
    pub bridge: BridgeSection,
    /// Desired-state persistence.
    pub store: StoreSection,
    /// Logging.
    pub logging: LoggingSection,
}

/// `[registry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Namespace prefix of every injection id.
    pub id_prefix: String,
    /// Whether registrations target every frame or only the top frame.
    pub all_frames: bool,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            id_prefix: "patchbay".to_owned(),
            all_frames: false,
        }
    }
}

/// `[bridge]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Prefix of every page-visible key.
    pub prefix: String,
    /// Suffix of the mirrored enabled-module list key.
    pub enabled_list_key: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            prefix: "__patchbay".to_owned(),
            enabled_list_key: "enabled".to_owned(),
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// JSON state file. `None` means the platform data directory.
    pub path: Option<PathBuf>,
}

impl StoreSection {
    /// The state file to use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] if no path is configured and the
    /// platform data directory cannot be determined.
    pub fn resolve_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        directories::ProjectDirs::from("", "", "patchbay")
            .map(|dirs| dirs.data_dir().join(STATE_FILE_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Output format: `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra `tracing` filter directives, e.g. `patchbay_bridge=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
