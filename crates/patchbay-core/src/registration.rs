//! Live registration records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{InjectionId, ModuleId};
use crate::scope::{Scope, ScopeKey};

/// Host match rule for an injected module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPattern {
    /// Pages of a single origin.
    Origin(String),
    /// Every page.
    All,
}

impl MatchPattern {
    /// The match rule for a registration in `scope`.
    ///
    /// Origin scopes with a scheme match that exact origin; bare hosts match
    /// the host under any scheme. The global scope matches everything.
    #[must_use]
    pub fn for_scope(scope: &Scope) -> Self {
        match scope {
            Scope::Origin(origin) if origin.has_scheme() => Self::Origin(format!("{origin}/*")),
            Scope::Origin(origin) => Self::Origin(format!("*://{origin}/*")),
            Scope::Global => Self::All,
        }
    }

    /// The pattern as the host expects it.
    #[must_use]
    pub fn as_host_pattern(&self) -> &str {
        match self {
            Self::Origin(pattern) => pattern,
            Self::All => "<all_urls>",
        }
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_host_pattern())
    }
}

/// One module currently injected by the host.
///
/// Owned by the reconciler: created when a module is newly enabled for a
/// scope and dropped when it is disabled, swept on a mode switch, or swept
/// at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registry key (scope + module).
    pub scope_key: ScopeKey,
    /// Host-side id, unique for the life of the process and never reused.
    pub injection_id: InjectionId,
    /// Host match rule.
    pub match_pattern: MatchPattern,
}

impl Registration {
    /// Build a registration for `scope_key` under a freshly generated id.
    #[must_use]
    pub fn new(scope_key: ScopeKey, id_prefix: &str) -> Self {
        let match_pattern = MatchPattern::for_scope(&scope_key.scope());
        Self {
            scope_key,
            injection_id: InjectionId::generate(id_prefix),
            match_pattern,
        }
    }

    /// The injected module.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        self.scope_key.module_id()
    }

    /// The scope the module is injected into.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope_key.scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Origin;

    #[test]
    fn test_match_pattern_for_bare_host() {
        let scope = Scope::Origin(Origin::parse("example.com").unwrap());
        assert_eq!(
            MatchPattern::for_scope(&scope).as_host_pattern(),
            "*://example.com/*"
        );
    }

    #[test]
    fn test_match_pattern_for_full_origin() {
        let scope = Scope::Origin(Origin::parse("https://example.com").unwrap());
        assert_eq!(
            MatchPattern::for_scope(&scope).as_host_pattern(),
            "https://example.com/*"
        );
    }

    #[test]
    fn test_match_pattern_for_global() {
        assert_eq!(MatchPattern::for_scope(&Scope::Global), MatchPattern::All);
        assert_eq!(MatchPattern::All.to_string(), "<all_urls>");
    }

    #[test]
    fn test_registration_new_generates_fresh_ids() {
        let key = ScopeKey::new(&Scope::Global, ModuleId::new("a").unwrap());
        let first = Registration::new(key.clone(), "patchbay");
        let second = Registration::new(key, "patchbay");

        assert_ne!(first.injection_id, second.injection_id);
        assert_eq!(first.module_id().as_str(), "a");
        assert_eq!(first.scope(), Scope::Global);
        assert_eq!(first.match_pattern, MatchPattern::All);
    }
}
