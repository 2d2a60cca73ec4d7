//! Coordinator error types.

use thiserror::Error;

use patchbay_core::CoreError;
use patchbay_storage::StorageError;

/// Errors reported by the host's script-injection control surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host has no registration with this id. Benign when unregistering.
    #[error("registration not found: {0}")]
    NotFound(String),

    /// The host refused the request (bad match pattern, duplicate id, ...).
    #[error("host rejected request: {0}")]
    Rejected(String),

    /// The control surface could not be reached.
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

impl HostError {
    /// Whether this error means the registration is already gone.
    #[must_use]
    pub fn is_already_gone(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors from coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The desired-state store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A command carried an invalid scope or id.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The coordinator task is no longer running.
    #[error("coordinator has stopped")]
    Stopped,
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
