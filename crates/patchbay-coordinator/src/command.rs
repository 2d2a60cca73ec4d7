//! Messages from the UI layer and their responses.

use serde::{Deserialize, Serialize};

use patchbay_core::{InjectionId, Mode, ModuleId, Registration};

/// A command sent to the coordinator.
///
/// Wire shape:
///
/// ```json
/// {"command": "toggle_mode", "requestedMode": "global"}
/// {"command": "reconcile", "scope": "example.com", "isGlobal": false, "moduleIds": ["A"]}
/// {"command": "status"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CoordinatorCommand {
    /// Switch the process-wide mode.
    ToggleMode {
        /// Target mode.
        requested_mode: Mode,
    },
    /// Converge one scope to an explicit module list.
    Reconcile {
        /// Origin, or the global sentinel.
        scope: String,
        /// Whether `scope` is the global scope.
        is_global: bool,
        /// Desired modules.
        module_ids: Vec<ModuleId>,
    },
    /// Report the mode and live registrations.
    Status,
}

/// The coordinator's answer to a [`CoordinatorCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CommandResponse {
    /// The mode switched.
    ModeChanged {
        /// Previous mode.
        from: Mode,
        /// New mode.
        to: Mode,
        /// Registrations swept from the old family.
        swept: usize,
        /// Registrations created for the new family.
        registered: usize,
        /// The new family waits until the old one is fully removed.
        deferred: bool,
    },
    /// The requested mode was already active.
    ModeUnchanged {
        /// The active mode.
        mode: Mode,
    },
    /// A scope was reconciled.
    Reconciled {
        /// Registrations created.
        registered: Vec<InjectionId>,
        /// Registrations removed.
        unregistered: Vec<InjectionId>,
        /// Desired modules already live.
        unchanged: usize,
        /// Host calls that failed.
        failed: usize,
    },
    /// The command was refused without touching the registry.
    Rejected {
        /// Why.
        reason: String,
    },
    /// Current state.
    Status {
        /// Active mode.
        mode: Mode,
        /// Live registrations.
        registrations: Vec<Registration>,
    },
}
