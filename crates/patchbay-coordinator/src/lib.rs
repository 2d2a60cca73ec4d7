//! Patchbay Coordinator - keeps the browser's script registrations equal to
//! the desired state.
//!
//! The coordinator owns three pieces:
//!
//! - [`Reconciler`]: diffs one scope's desired modules against what is live
//!   in the [`ScriptHost`] and issues the register/unregister calls, old
//!   registrations first
//! - [`ModeManager`]: switches between per-origin and global scopes, tearing
//!   the old family down before the new one goes live
//! - [`Coordinator`]: startup sweep, UI [`CoordinatorCommand`]s, and a task
//!   that follows desired-state changes on the event bus
//!
//! # Example
//!
//! ```rust,ignore
//! use patchbay_coordinator::{Coordinator, CoordinatorCommand, ReconcilerConfig};
//!
//! let coordinator = Coordinator::new(store, host, ReconcilerConfig::default());
//! coordinator.start().await?;
//! let (handle, task) = coordinator.spawn();
//! handle.send(CoordinatorCommand::Status).await?;
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod command;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod mode;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use command::{CommandResponse, CoordinatorCommand};
pub use coordinator::{Coordinator, CoordinatorHandle, StartupReport};
pub use error::{CoordinatorError, CoordinatorResult, HostError, HostResult};
pub use host::{ExecutionWorld, RunAt, ScriptHost, ScriptRegistration};
pub use mode::{ModeManager, ModeTransition};
pub use reconciler::{
    DEFAULT_ID_PREFIX, HostFailure, ReconcileReport, Reconciler, ReconcilerConfig, SweepReport,
};
