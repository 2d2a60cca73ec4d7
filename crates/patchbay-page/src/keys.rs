//! Page-visible key naming.
//!
//! Every key the bridge writes is `<prefix>_<moduleId>_<field>`. The
//! enabled-module mirror lives at `<prefix>_<enabledKey>`.

use patchbay_core::ModuleId;

/// Default prefix of page-visible keys.
pub const DEFAULT_BRIDGE_PREFIX: &str = "__patchbay";

/// Default suffix of the enabled-module mirror key.
pub const DEFAULT_ENABLED_LIST_KEY: &str = "enabled";

/// Key layout shared by the bridge (writer) and the module runtime (reader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeKeys {
    prefix: String,
    enabled_list_key: String,
}

impl BridgeKeys {
    /// Key layout with a custom prefix and enabled-list suffix.
    #[must_use]
    pub fn new(prefix: impl Into<String>, enabled_list_key: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            enabled_list_key: enabled_list_key.into(),
        }
    }

    /// The key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of one configuration field of one module.
    #[must_use]
    pub fn field_key(&self, module_id: &ModuleId, field: &str) -> String {
        format!("{}_{}_{}", self.prefix, module_id, field)
    }

    /// Prefix shared by every field key of `module_id`.
    #[must_use]
    pub fn module_prefix(&self, module_id: &ModuleId) -> String {
        format!("{}_{}_", self.prefix, module_id)
    }

    /// Key of the enabled-module mirror.
    #[must_use]
    pub fn enabled_key(&self) -> String {
        format!("{}_{}", self.prefix, self.enabled_list_key)
    }
}

impl Default for BridgeKeys {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_PREFIX, DEFAULT_ENABLED_LIST_KEY)
    }
}
