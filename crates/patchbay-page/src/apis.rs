//! The patchable page API surface.
//!
//! A patch is a closure installed under an API name. Calls to a patched API
//! go through the closure; an unpatched API answers `None`, meaning the
//! page's native behaviour applies.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{ModuleError, ModuleResult};

/// Replacement behaviour of one page API.
pub type Interceptor = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Page APIs and the patches installed over them.
#[derive(Default)]
pub struct PageApis {
    patches: DashMap<String, Interceptor>,
}

impl std::fmt::Debug for PageApis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageApis")
            .field("patched", &self.patched_apis())
            .finish()
    }
}

impl PageApis {
    /// Install `interceptor` over `api`, replacing any earlier patch.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Install`] if `api` is empty.
    pub fn install(&self, api: &str, interceptor: Interceptor) -> ModuleResult<()> {
        if api.is_empty() {
            return Err(ModuleError::Install("api name must not be empty".to_owned()));
        }
        debug!(api, "Installing page API patch");
        self.patches.insert(api.to_owned(), interceptor);
        Ok(())
    }

    /// Call `api` with `args`.
    ///
    /// Returns the patched answer, or `None` if the API is not patched or
    /// the patch defers to native behaviour.
    #[must_use]
    pub fn call(&self, api: &str, args: &Value) -> Option<Value> {
        let interceptor = self.patches.get(api).map(|entry| Arc::clone(entry.value()))?;
        interceptor(args)
    }

    /// Whether `api` is patched.
    #[must_use]
    pub fn is_patched(&self, api: &str) -> bool {
        self.patches.contains_key(api)
    }

    /// Names of every patched API, sorted.
    #[must_use]
    pub fn patched_apis(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
