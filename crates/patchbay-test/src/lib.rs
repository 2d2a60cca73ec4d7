//! Patchbay Test - Shared test utilities.
//!
//! Mocks and fixtures used as a dev-dependency by the integration tests and
//! the CLI.
//!
//! ```toml
//! [dev-dependencies]
//! patchbay-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use patchbay_test::{MockScriptHost, test_coordinator};
//!
//! #[tokio::test]
//! async fn test_enable_registers() {
//!     let host = MockScriptHost::new();
//!     let coordinator = test_coordinator(&host);
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
