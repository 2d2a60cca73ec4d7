//! Convenient re-exports for coordinator users.
//!
//! ```rust
//! use patchbay_coordinator::prelude::*;
//! ```

pub use crate::{
    CommandResponse, Coordinator, CoordinatorCommand, CoordinatorError, CoordinatorHandle,
    CoordinatorResult, HostError, ModeManager, Reconciler, ReconcilerConfig, ScriptHost,
    ScriptRegistration,
};
