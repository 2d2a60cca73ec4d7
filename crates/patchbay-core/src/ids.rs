//! Validated identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Maximum length of a module identifier.
const MAX_MODULE_ID_LEN: usize = 128;

/// Identifier of a capability module (e.g. `canvas-noise`).
///
/// Module ids appear inside page-visible key names and host registration
/// records, so they are restricted to ASCII alphanumerics plus `-` and
/// `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a module id, validating its characters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidModuleId`] if the id is empty, longer than
    /// 128 bytes, or contains characters outside `[A-Za-z0-9.-]`. `_` is
    /// excluded because it separates the module id from the field name in
    /// page-visible keys.
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_MODULE_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'));
        if valid {
            Ok(Self(id))
        } else {
            Err(CoreError::InvalidModuleId(id))
        }
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl std::str::FromStr for ModuleId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::new(s)
    }
}

impl From<ModuleId> for String {
    fn from(id: ModuleId) -> Self {
        id.0
    }
}

/// A normalized website origin.
///
/// Accepts either a full origin (`https://example.com`) or a bare host with
/// an optional port (`example.com`, `localhost:8080`). Full origins are
/// reduced to their ASCII serialization; bare hosts are lowercased and
/// IDNA-normalized. A bare host matches every scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Parse and normalize an origin.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOrigin`] if the input is empty, is not a
    /// tuple origin, or carries a path, query or fragment.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let trimmed = input.trim();
        let invalid = |reason: &str| CoreError::InvalidOrigin {
            input: input.to_owned(),
            reason: reason.to_owned(),
        };

        if trimmed.is_empty() {
            return Err(invalid("origin must not be empty"));
        }

        if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
            let origin = url.origin();
            if !origin.is_tuple() {
                return Err(invalid("opaque origins cannot be targeted"));
            }
            return Ok(Self(origin.ascii_serialization()));
        }

        let url = Url::parse(&format!("https://{trimmed}")).map_err(|e| invalid(&e.to_string()))?;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("bare origins must not carry a path, query or fragment"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("origins must not carry credentials"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let normalized = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        Ok(Self(normalized))
    }

    /// The normalized origin string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the origin names a scheme (`https://example.com`) rather than
    /// a bare host.
    #[must_use]
    pub fn has_scheme(&self) -> bool {
        self.0.contains("://")
    }

    /// The bare-host form of this origin (`https://example.com:8443`
    /// becomes `example.com:8443`). Bare origins are returned unchanged.
    #[must_use]
    pub fn host(&self) -> Self {
        match self.0.split_once("://") {
            Some((_, host)) => Self(host.to_owned()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Origin {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::parse(&value)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

/// Host-side identifier of one injected registration.
///
/// Generated fresh for every registration (`{prefix}-{uuid}`) and never
/// reused. The prefix marks the id as belonging to this coordinator so the
/// startup sweep can find survivors of a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InjectionId(String);

impl InjectionId {
    /// Generate a new, never-before-used id under `prefix`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4().simple()))
    }

    /// Wrap an id reported by the host.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Check that `prefix` is usable as an injection id namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPrefix`] if the prefix is empty, starts
    /// with `_`, or contains characters outside `[A-Za-z0-9_]`. `-` is
    /// excluded because it ends the namespace in generated ids.
    pub fn validate_prefix(prefix: &str) -> CoreResult<()> {
        let valid = !prefix.is_empty()
            && !prefix.starts_with('_')
            && prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(CoreError::InvalidPrefix(prefix.to_owned()))
        }
    }

    /// Whether this id was generated under `prefix`: the prefix, one `-`,
    /// then a tail without further dashes.
    #[must_use]
    pub fn has_namespace(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|tail| !tail.is_empty() && !tail.contains('-'))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
