//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// Reading or writing the backing file failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// File being accessed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The scope would inject into the same pages as another non-empty scope.
    #[error("scope {scope} overlaps {existing}; clear one of them first")]
    OverlappingScope {
        /// Scope being written.
        scope: String,
        /// Non-empty scope it collides with.
        existing: String,
    },

    /// The namespace or key is invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
