//! Prelude module - commonly used types for convenient import.
//!
//! Use `use patchbay_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult};

// Identifiers
pub use crate::{InjectionId, ModuleId, Origin};

// Scopes and modes
pub use crate::{Mode, Scope, ScopeFilter, ScopeKey};

// Registrations
pub use crate::{MatchPattern, Registration};

// Configuration
pub use crate::{BridgeField, ModuleConfig};

// Notifications
pub use crate::DesiredStateChange;
