//! Error types for capability modules.

use thiserror::Error;

/// Errors a capability module can hit while activating.
///
/// These never reach the page: the runtime turns them into
/// [`ActivationOutcome::Failed`](crate::ActivationOutcome::Failed).
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A configuration field the module requires was not bridged.
    #[error("module {module_id} is missing config field {field}")]
    MissingField {
        /// Module that asked for the field.
        module_id: String,
        /// Field name.
        field: String,
    },

    /// A bridged field could not be decoded.
    #[error("module {module_id} has invalid config field {field}: {reason}")]
    InvalidField {
        /// Module that read the field.
        module_id: String,
        /// Field name.
        field: String,
        /// Why decoding failed.
        reason: String,
    },

    /// Patching a page API failed.
    #[error("failed to install patch: {0}")]
    Install(String),
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;
