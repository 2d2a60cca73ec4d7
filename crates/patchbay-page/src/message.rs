//! In-realm messages and capture payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use patchbay_core::ModuleId;

/// Identity of one browsing window. Messages are only honoured when their
/// source is the realm's own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(Uuid);

impl WindowId {
    /// A fresh window id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The readiness broadcast: configuration for `module_ids` has been written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadySignal {
    /// Modules whose configuration keys are present.
    pub module_ids: Vec<ModuleId>,
}

impl ReadySignal {
    /// Signal listing `module_ids`.
    #[must_use]
    pub fn new(module_ids: Vec<ModuleId>) -> Self {
        Self { module_ids }
    }

    /// Whether `id` is listed.
    #[must_use]
    pub fn lists(&self, id: &ModuleId) -> bool {
        self.module_ids.contains(id)
    }
}

/// Messages exchanged through in-realm messaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageMessage {
    /// `{"event": "config_ready", "moduleIds": [...]}`
    ConfigReady(ReadySignal),
}

/// Data captured by a module, sent out of the page realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapturePayload {
    /// Successfully serialized capture.
    Data {
        /// Module that captured the data.
        module_id: ModuleId,
        /// Patched API that observed it.
        api: String,
        /// The captured value.
        data: Value,
    },
    /// The captured value could not cross the realm boundary.
    Error {
        /// Module that captured the data.
        module_id: ModuleId,
        /// Patched API that observed it.
        api: String,
        /// Failure category (e.g. `serialization`).
        kind: String,
        /// Human-readable detail for diagnostics.
        message: String,
    },
}

impl CapturePayload {
    /// The module that produced this payload.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        match self {
            Self::Data { module_id, .. } | Self::Error { module_id, .. } => module_id,
        }
    }

    /// Whether this is the error-shaped payload.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
