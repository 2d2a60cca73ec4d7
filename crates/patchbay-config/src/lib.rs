//! Layered configuration for patchbay.
//!
//! # Usage
//!
//! ```rust,no_run
//! use patchbay_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("Injection ids start with {}", resolved.config.registry.id_prefix);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment** (`PATCHBAY_LOG_LEVEL`, `PATCHBAY_BRIDGE_PREFIX`,
//!    `PATCHBAY_STATE_PATH`)
//! 2. **Explicit file** (`--config <path>`)
//! 3. **User** (`$PATCHBAY_HOME/config.toml`, else `~/.patchbay/config.toml`)
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other patchbay crates; callers convert
//! sections into domain types at startup.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit)
    }
}
