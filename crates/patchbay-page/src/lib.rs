//! Patchbay Page - the page realm and the capability module protocol.
//!
//! A [`PageRealm`] models one navigation of the page's own execution realm:
//!
//! - the page-visible key/value area ([`PageStorage`]), the only channel
//!   into the realm
//! - same-window messaging carrying the readiness broadcast
//!   ([`ReadySignal`]), latched for the lifetime of the navigation
//! - the per-navigation consumed set that makes configuration delivery
//!   single-consumer
//! - the patchable API surface ([`PageApis`])
//! - an outbound channel for captured data ([`CapturePayload`])
//!
//! The [`protocol`] module defines the activation life cycle every
//! capability module follows.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use patchbay_core::Origin;
//! use patchbay_page::{BridgeKeys, ModuleRuntime, PageRealm};
//!
//! let realm = Arc::new(PageRealm::new(Origin::parse("example.com").unwrap()));
//! let runtime = ModuleRuntime::new(Arc::clone(&realm), BridgeKeys::default());
//!
//! // Nothing is discoverable until the bridge mirrors the enabled list.
//! assert!(runtime.discoverable(&[]).is_empty());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod apis;
pub mod error;
pub mod keys;
pub mod message;
pub mod prelude;
pub mod protocol;
pub mod realm;
pub mod settings;

pub use apis::{Interceptor, PageApis};
pub use error::{ModuleError, ModuleResult};
pub use keys::{BridgeKeys, DEFAULT_BRIDGE_PREFIX, DEFAULT_ENABLED_LIST_KEY};
pub use message::{CapturePayload, PageMessage, ReadySignal, WindowId};
pub use protocol::{
    Activation, ActivationGuard, ActivationOutcome, CapabilityModule, ModuleLoader, ModuleRuntime,
};
pub use realm::{PageRealm, PageStorage, Readiness};
pub use settings::BridgedSettings;
