//! Scopes, scope keys and the process-wide mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ids::{ModuleId, Origin};

/// Storage sentinel for the global scope.
const GLOBAL_SENTINEL: &str = "global";

/// Storage prefix for origin scopes.
const ORIGIN_PREFIX: &str = "origin:";

/// Which scope family is authoritative.
///
/// In [`Mode::Standard`] modules are enabled per origin; in [`Mode::Global`]
/// a single module set applies to every origin. Registrations of the
/// inactive family must never be live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Per-origin scoping.
    #[default]
    Standard,
    /// One scope for all origins.
    Global,
}

impl Mode {
    /// The other mode.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Standard => Self::Global,
            Self::Global => Self::Standard,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Global => f.write_str("global"),
        }
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "standard" => Ok(Self::Standard),
            "global" => Ok(Self::Global),
            other => Err(CoreError::InvalidScope(other.to_owned())),
        }
    }
}

/// The targeting domain of a registration: one origin, or every origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// A single origin.
    Origin(Origin),
    /// All origins.
    Global,
}

impl Scope {
    /// Build a scope from the UI's `(scope, isGlobal)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOrigin`] if `is_global` is false and
    /// `scope` is not a valid origin.
    pub fn from_parts(scope: &str, is_global: bool) -> CoreResult<Self> {
        if is_global {
            Ok(Self::Global)
        } else {
            Origin::parse(scope).map(Self::Origin)
        }
    }

    /// The mode under which this scope is authoritative.
    #[must_use]
    pub fn family(&self) -> Mode {
        match self {
            Self::Origin(_) => Mode::Standard,
            Self::Global => Mode::Global,
        }
    }

    /// Whether this is the global scope.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Whether both scopes would inject into the same page.
    ///
    /// A bare host (`example.com`) matches every scheme, so it overlaps each
    /// full origin of that host (`https://example.com`). Two full origins
    /// with different schemes do not overlap, and a scope never overlaps
    /// itself.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Origin(a), Self::Origin(b)) => {
                a != b && a.host() == b.host() && (!a.has_scheme() || !b.has_scheme())
            },
            _ => false,
        }
    }

    /// Stable storage key (`global` or `origin:{origin}`).
    ///
    /// The `origin:` prefix keeps an origin literally named `global` from
    /// colliding with the sentinel.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Origin(origin) => format!("{ORIGIN_PREFIX}{origin}"),
            Self::Global => GLOBAL_SENTINEL.to_owned(),
        }
    }

    /// Parse a key produced by [`Scope::storage_key`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidScope`] for unknown keys and
    /// [`CoreError::InvalidOrigin`] for malformed origins.
    pub fn from_storage_key(key: &str) -> CoreResult<Self> {
        if key == GLOBAL_SENTINEL {
            return Ok(Self::Global);
        }
        let origin = key
            .strip_prefix(ORIGIN_PREFIX)
            .ok_or_else(|| CoreError::InvalidScope(key.to_owned()))?;
        Origin::parse(origin).map(Self::Origin)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

impl TryFrom<String> for Scope {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::from_storage_key(&value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.storage_key()
    }
}

/// Typed registration key: one module in one scope.
///
/// Keys of different families never compare equal, and scope membership is
/// decided structurally rather than by string prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScopeKey {
    /// A module enabled for one origin.
    Origin {
        /// Target origin.
        origin: Origin,
        /// Enabled module.
        module_id: ModuleId,
    },
    /// A module enabled for every origin.
    Global {
        /// Enabled module.
        module_id: ModuleId,
    },
}

impl ScopeKey {
    /// Key for `module_id` within `scope`.
    #[must_use]
    pub fn new(scope: &Scope, module_id: ModuleId) -> Self {
        match scope {
            Scope::Origin(origin) => Self::Origin {
                origin: origin.clone(),
                module_id,
            },
            Scope::Global => Self::Global { module_id },
        }
    }

    /// The module this key refers to.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        match self {
            Self::Origin { module_id, .. } | Self::Global { module_id } => module_id,
        }
    }

    /// The scope this key belongs to.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match self {
            Self::Origin { origin, .. } => Scope::Origin(origin.clone()),
            Self::Global { .. } => Scope::Global,
        }
    }

    /// The scope family of this key.
    #[must_use]
    pub fn family(&self) -> Mode {
        match self {
            Self::Origin { .. } => Mode::Standard,
            Self::Global { .. } => Mode::Global,
        }
    }

    /// Whether this key lives in `scope`.
    #[must_use]
    pub fn belongs_to(&self, scope: &Scope) -> bool {
        match (self, scope) {
            (Self::Origin { origin, .. }, Scope::Origin(target)) => origin == target,
            (Self::Global { .. }, Scope::Global) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin { origin, module_id } => write!(f, "{origin}|{module_id}"),
            Self::Global { module_id } => write!(f, "{GLOBAL_SENTINEL}|{module_id}"),
        }
    }
}

/// Structural selector over scope keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// Every key.
    All,
    /// Keys of one scope.
    Scope(Scope),
    /// Keys of one scope family.
    Family(Mode),
}

impl ScopeFilter {
    /// Whether `key` is selected.
    #[must_use]
    pub fn matches(&self, key: &ScopeKey) -> bool {
        match self {
            Self::All => true,
            Self::Scope(scope) => key.belongs_to(scope),
            Self::Family(mode) => key.family() == *mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id).unwrap()
    }

    fn origin_scope(origin: &str) -> Scope {
        Scope::Origin(Origin::parse(origin).unwrap())
    }

    #[test]
    fn test_mode_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Global).unwrap(), "\"global\"");
        let mode: Mode = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(mode, Mode::Standard);
        assert_eq!(Mode::Standard.other(), Mode::Global);
    }

    #[test]
    fn test_scope_storage_key_round_trip() {
        for scope in [origin_scope("example.com"), Scope::Global] {
            let key = scope.storage_key();
            assert_eq!(Scope::from_storage_key(&key).unwrap(), scope);
        }
    }

    #[test]
    fn test_origin_named_global_does_not_collide() {
        let odd = origin_scope("global");
        assert_ne!(odd.storage_key(), Scope::Global.storage_key());
        assert_eq!(Scope::from_storage_key(&odd.storage_key()).unwrap(), odd);
    }

    #[test]
    fn test_from_storage_key_rejects_unknown() {
        assert!(Scope::from_storage_key("example.com").is_err());
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(Scope::from_parts("ignored", true).unwrap(), Scope::Global);
        assert_eq!(
            Scope::from_parts("example.com", false).unwrap(),
            origin_scope("example.com")
        );
    }

    #[test]
    fn test_bare_host_overlaps_full_origins() {
        let bare = origin_scope("example.com");
        let https = origin_scope("https://example.com");
        let http = origin_scope("http://example.com");

        assert!(bare.overlaps(&https));
        assert!(https.overlaps(&bare));
        assert!(bare.overlaps(&http));
        assert!(!https.overlaps(&http));
        assert!(!bare.overlaps(&bare));
        assert!(!bare.overlaps(&origin_scope("https://example.com:8443")));
        assert!(!bare.overlaps(&origin_scope("other.example")));
        assert!(!Scope::Global.overlaps(&bare));
    }

    #[test]
    fn test_scope_key_membership_is_structural() {
        let a = ScopeKey::new(&origin_scope("example.com"), module("a"));
        let sub = ScopeKey::new(&origin_scope("example.com.evil.net"), module("a"));
        let global = ScopeKey::new(&Scope::Global, module("a"));

        assert!(a.belongs_to(&origin_scope("example.com")));
        assert!(!sub.belongs_to(&origin_scope("example.com")));
        assert!(!global.belongs_to(&origin_scope("example.com")));
        assert!(global.belongs_to(&Scope::Global));
        assert_ne!(a, global);
    }

    #[test]
    fn test_scope_key_display() {
        let key = ScopeKey::new(&origin_scope("example.com"), module("a"));
        assert_eq!(key.to_string(), "example.com|a");
        let key = ScopeKey::new(&Scope::Global, module("a"));
        assert_eq!(key.to_string(), "global|a");
    }

    #[test]
    fn test_scope_filter() {
        let origin_key = ScopeKey::new(&origin_scope("example.com"), module("a"));
        let global_key = ScopeKey::new(&Scope::Global, module("a"));

        assert!(ScopeFilter::All.matches(&origin_key));
        assert!(ScopeFilter::Family(Mode::Standard).matches(&origin_key));
        assert!(!ScopeFilter::Family(Mode::Standard).matches(&global_key));
        assert!(ScopeFilter::Scope(Scope::Global).matches(&global_key));
        assert!(!ScopeFilter::Scope(origin_scope("other.org")).matches(&origin_key));
    }

    #[test]
    fn test_scope_key_serde_is_tagged() {
        let key = ScopeKey::new(&Scope::Global, module("a"));
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["kind"], "global");
        assert_eq!(json["module_id"], "a");
    }
}
