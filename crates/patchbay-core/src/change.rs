//! Desired-state change notification.

use serde::{Deserialize, Serialize};

use crate::ids::ModuleId;
use crate::scope::Scope;

/// Notification that the desired module set of one scope changed.
///
/// `new_module_ids` is `None` when the scope's entry was removed, which the
/// reconciler treats as an empty desired set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredStateChange {
    /// The scope whose entry changed.
    pub scope_key: Scope,
    /// The new desired set, or `None` if the entry was removed.
    pub new_module_ids: Option<Vec<ModuleId>>,
}

impl DesiredStateChange {
    /// The desired set this change asks for (empty when removed).
    #[must_use]
    pub fn desired(&self) -> &[ModuleId] {
        self.new_module_ids.as_deref().unwrap_or_default()
    }
}
