//! Patchbay Core - Shared types for the patchbay script activation coordinator.
//!
//! This crate provides:
//! - Validated identifiers ([`ModuleId`], [`Origin`], [`InjectionId`])
//! - The typed registration key ([`ScopeKey`]) and its scope predicates
//! - The process-wide [`Mode`] and the per-module [`ModuleConfig`]
//! - Wire types shared between the UI layer and the coordinator
//!
//! # Scopes
//!
//! Every registration belongs to exactly one scope family. Origin scopes
//! target a single site; the global scope targets every site. The two
//! families are never live at the same time, and [`Mode`] decides which one
//! is authoritative.
//!
//! ```rust
//! use patchbay_core::{Mode, ModuleId, Origin, Scope, ScopeKey};
//!
//! let origin = Origin::parse("example.com").unwrap();
//! let key = ScopeKey::new(&Scope::Origin(origin), ModuleId::new("canvas-noise").unwrap());
//!
//! assert_eq!(key.family(), Mode::Standard);
//! assert_eq!(key.to_string(), "example.com|canvas-noise");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod change;
mod config;
mod error;
mod ids;
mod registration;
mod scope;

pub use change::DesiredStateChange;
pub use config::{BridgeField, ModuleConfig, encode_field_value};
pub use error::{CoreError, CoreResult};
pub use ids::{InjectionId, ModuleId, Origin};
pub use registration::{MatchPattern, Registration};
pub use scope::{Mode, Scope, ScopeFilter, ScopeKey};
