//! Per-module configuration records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name of a fixed-override value.
const FIELD_VALUE: &str = "value";
/// Field name of a capture predicate.
const FIELD_FLAG: &str = "flag";
/// Field name of a capture parameter list.
const FIELD_PARAM: &str = "param";

/// Configuration of one capability module.
///
/// Created the first time a module with defaults is enabled, edited by the
/// UI, and kept when the module is disabled so a re-enable restores it.
/// `keyword_filter_enabled` gates the UI only and is never delivered to the
/// page realm. Any other boolean field is a dynamic switch (for example
/// `breakpoint` or `stackTrace`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Fixed override for value-replacing modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Predicate gating a capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<Value>,
    /// Parameters of the capture predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<Value>,
    /// UI-only keyword filter toggle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keyword_filter_enabled: bool,
    /// Dynamic boolean switches.
    #[serde(flatten)]
    pub switches: BTreeMap<String, bool>,
}

/// One page-deliverable configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeField {
    /// Field name (`value`, `flag`, `param`, or a switch name).
    pub name: String,
    /// Encoded field value.
    pub value: String,
}

impl ModuleConfig {
    /// Set the fixed override value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the capture predicate and its parameters.
    #[must_use]
    pub fn with_capture(mut self, flag: impl Into<Value>, param: impl Into<Value>) -> Self {
        self.flag = Some(flag.into());
        self.param = Some(param.into());
        self
    }

    /// Set a dynamic switch.
    #[must_use]
    pub fn with_switch(mut self, name: impl Into<String>, on: bool) -> Self {
        self.switches.insert(name.into(), on);
        self
    }

    /// The fields delivered to the page realm, in a stable order.
    ///
    /// `value` is always written as JSON so its type survives the page-visible
    /// string form. `flag` and `param` go through [`encode_field_value`].
    /// `keyword_filter_enabled` is never included.
    #[must_use]
    pub fn bridge_fields(&self) -> Vec<BridgeField> {
        let value = self.value.as_ref().map(|v| BridgeField {
            name: FIELD_VALUE.to_owned(),
            value: v.to_string(),
        });
        let fixed = [
            (FIELD_FLAG, self.flag.as_ref()),
            (FIELD_PARAM, self.param.as_ref()),
        ];

        let mut fields: Vec<BridgeField> = value
            .into_iter()
            .chain(fixed.into_iter().filter_map(|(name, value)| {
                value.map(|v| BridgeField {
                    name: name.to_owned(),
                    value: encode_field_value(v),
                })
            }))
            .collect();

        fields.extend(self.switches.iter().map(|(name, on)| BridgeField {
            name: name.clone(),
            value: on.to_string(),
        }));
        fields
    }

    /// Whether this record has anything to deliver to the page realm.
    ///
    /// Only modules with deliverable configuration take part in the
    /// readiness handshake.
    #[must_use]
    pub fn is_deliverable(&self) -> bool {
        self.value.is_some()
            || self.flag.is_some()
            || self.param.is_some()
            || !self.switches.is_empty()
    }
}

/// Encode a configuration value as a page-visible string.
///
/// Strings are written as-is, booleans and numbers as their decimal text,
/// and structured values as JSON. The bare string form is lossy: `"123"`
/// and `123` encode identically, so fields whose type matters are written
/// with plain JSON instead (see [`ModuleConfig::bridge_fields`]).
#[must_use]
pub fn encode_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
