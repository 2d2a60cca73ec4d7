//! Configuration as read back from the page-visible area.

use std::collections::BTreeMap;

use serde_json::Value;

use patchbay_core::ModuleId;

use crate::error::{ModuleError, ModuleResult};

/// The bridged configuration fields a module drained for this navigation.
///
/// Values are the page-visible strings: bare text for `flag`, booleans
/// and numbers as decimal text, structured values and `value` as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgedSettings {
    module_id: ModuleId,
    fields: BTreeMap<String, String>,
}

impl BridgedSettings {
    /// Settings of `module_id` with no fields (used by immediate modules).
    #[must_use]
    pub fn empty(module_id: ModuleId) -> Self {
        Self {
            module_id,
            fields: BTreeMap::new(),
        }
    }

    /// Settings built from already-read fields.
    #[must_use]
    pub fn from_fields(module_id: ModuleId, fields: BTreeMap<String, String>) -> Self {
        Self { module_id, fields }
    }

    /// Module these settings belong to.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Raw string of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Raw string of `field`, failing if it was not bridged.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingField`] if the field is absent.
    pub fn require(&self, field: &str) -> ModuleResult<&str> {
        self.get(field).ok_or_else(|| ModuleError::MissingField {
            module_id: self.module_id.to_string(),
            field: field.to_owned(),
        })
    }

    /// The capture predicate.
    #[must_use]
    pub fn flag(&self) -> Option<&str> {
        self.get("flag")
    }

    /// The capture parameters as a list of strings.
    ///
    /// A JSON array yields one entry per element (strings unquoted). Any
    /// other text is a single-entry list.
    #[must_use]
    pub fn param_list(&self) -> Option<Vec<String>> {
        let raw = self.get("param")?;
        match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(items) => Some(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Err(_) => Some(vec![raw.to_owned()]),
        }
    }

    /// A dynamic switch. Anything other than `"true"` is off.
    #[must_use]
    pub fn switch(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    /// The fixed override value, decoded back to JSON.
    ///
    /// The bridge writes this field as JSON, so `"123"` stays a string.
    /// Text that is not valid JSON (a hand-written bare string) is returned
    /// as a JSON string.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        let raw = self.get("value")?;
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())))
    }

    /// Decode `field` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::MissingField`] if absent and
    /// [`ModuleError::InvalidField`] if not valid JSON for `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self, field: &str) -> ModuleResult<T> {
        let raw = self.require(field)?;
        serde_json::from_str(raw).map_err(|e| ModuleError::InvalidField {
            module_id: self.module_id.to_string(),
            field: field.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was bridged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(pairs: &[(&str, &str)]) -> BridgedSettings {
        BridgedSettings::from_fields(
            ModuleId::new("A").unwrap(),
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn test_flag_and_param_list() {
        let s = settings(&[("flag", "1"), ("param", r#"["x","y"]"#)]);
        assert_eq!(s.flag(), Some("1"));
        assert_eq!(s.param_list(), Some(vec!["x".to_owned(), "y".to_owned()]));
    }

    #[test]
    fn test_param_list_mixed_and_plain() {
        let s = settings(&[("param", "[1,\"a\",true]")]);
        assert_eq!(
            s.param_list(),
            Some(vec!["1".to_owned(), "a".to_owned(), "true".to_owned()])
        );

        let plain = settings(&[("param", "keyword")]);
        assert_eq!(plain.param_list(), Some(vec!["keyword".to_owned()]));
        assert!(settings(&[]).param_list().is_none());
    }

    #[test]
    fn test_switches() {
        let s = settings(&[("breakpoint", "true"), ("stackTrace", "false")]);
        assert!(s.switch("breakpoint"));
        assert!(!s.switch("stackTrace"));
        assert!(!s.switch("missing"));
    }

    #[test]
    fn test_value_decoding() {
        assert_eq!(settings(&[("value", "42")]).value(), Some(json!(42)));
        assert_eq!(
            settings(&[("value", "Europe/Berlin")]).value(),
            Some(json!("Europe/Berlin"))
        );
        assert_eq!(
            settings(&[("value", r#"{"w":1920}"#)]).value(),
            Some(json!({"w": 1920}))
        );
        assert_eq!(settings(&[("value", r#""123""#)]).value(), Some(json!("123")));
        assert_eq!(settings(&[("value", "true")]).value(), Some(json!(true)));
    }

    #[test]
    fn test_require_and_decode_errors() {
        let s = settings(&[("value", "nope")]);
        assert!(matches!(s.require("flag"), Err(ModuleError::MissingField { .. })));
        assert!(matches!(
            s.decode::<u32>("value"),
            Err(ModuleError::InvalidField { .. })
        ));
        assert_eq!(settings(&[("value", "7")]).decode::<u32>("value").unwrap(), 7);
    }
}
