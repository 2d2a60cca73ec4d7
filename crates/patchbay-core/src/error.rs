//! Core error types.

use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A module identifier is empty, too long, or contains forbidden characters.
    #[error("invalid module id {0:?}")]
    InvalidModuleId(String),

    /// An origin could not be parsed or normalized.
    #[error("invalid origin {input:?}: {reason}")]
    InvalidOrigin {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A scope storage key is malformed.
    #[error("invalid scope {0:?}")]
    InvalidScope(String),

    /// An injection id prefix is empty or contains forbidden characters.
    #[error("invalid injection id prefix {0:?}")]
    InvalidPrefix(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
