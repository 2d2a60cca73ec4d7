//! Patchbay Storage - persistence for desired state.
//!
//! # Tier 1: Raw Key-Value ([`KvStore`])
//!
//! Namespaced byte-level `get`/`set`/`delete`. Two backends:
//!
//! - [`MemoryKvStore`]: ephemeral, for tests and embedding hosts that
//!   persist elsewhere
//! - [`FileKvStore`]: a JSON snapshot file rewritten atomically on every
//!   mutation, used by the CLI
//!
//! [`ScopedKvStore`] pre-binds a namespace and adds JSON helpers.
//!
//! # Tier 2: Desired-State Store ([`DesiredStateStore`])
//!
//! The typed store the UI layer writes and the reconciler and bridge read:
//! desired module sets per scope, per-module configuration, and the
//! persisted mode. Every change to a desired set is announced on the
//! [`EventBus`](patchbay_events::EventBus).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod desired;
pub mod error;
pub mod file;
pub mod kv;

pub use desired::DesiredStateStore;
pub use error::{StorageError, StorageResult};
pub use file::FileKvStore;
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};
