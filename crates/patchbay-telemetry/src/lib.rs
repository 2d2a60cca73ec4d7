//! Patchbay Telemetry - logging and tracing for patchbay.
//!
//! This crate provides:
//! - Configurable `tracing` subscriber setup with multiple formats and
//!   targets
//! - [`NavigationContext`], a per-navigation span so the bridge and module
//!   logs of one page load correlate
//!
//! # Example
//!
//! ```rust,no_run
//! use patchbay_core::Origin;
//! use patchbay_telemetry::{LogConfig, LogFormat, NavigationContext, setup_logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("patchbay_coordinator=trace");
//! setup_logging(&config)?;
//!
//! let ctx = NavigationContext::new(Origin::parse("example.com")?);
//! let _guard = ctx.span().entered();
//! tracing::info!("Navigation started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{NavigationContext, NavigationGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
