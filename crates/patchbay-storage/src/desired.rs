//! Typed desired-state store.
//!
//! Layout inside the backing [`KvStore`]:
//!
//! | Namespace | Key | Value |
//! |-----------|-----|-------|
//! | `desired` | [`Scope::storage_key`] | JSON array of module ids |
//! | `module_config` | module id | JSON [`ModuleConfig`] |
//! | `settings` | `mode` | JSON [`Mode`] |
//!
//! Only the UI layer mutates this store. The reconciler and the bridge
//! read it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use patchbay_core::{DesiredStateChange, Mode, ModuleConfig, ModuleId, Scope};
use patchbay_events::{EventBus, EventMetadata, PatchbayEvent};

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, ScopedKvStore};

const DESIRED_NAMESPACE: &str = "desired";
const CONFIG_NAMESPACE: &str = "module_config";
const SETTINGS_NAMESPACE: &str = "settings";
const MODE_KEY: &str = "mode";

/// Event source name for notifications published by the store.
const EVENT_SOURCE: &str = "desired_state_store";

/// Desired module sets, module configuration and mode.
#[derive(Debug, Clone)]
pub struct DesiredStateStore {
    desired: ScopedKvStore,
    configs: ScopedKvStore,
    settings: ScopedKvStore,
    bus: EventBus,
    /// Serializes read-modify-write sequences on desired sets.
    write_lock: Arc<Mutex<()>>,
}

impl DesiredStateStore {
    /// Create a store over `kv` that announces changes on `bus`.
    ///
    /// # Errors
    ///
    /// Returns an error if a namespace cannot be bound (never for the
    /// built-in namespaces).
    pub fn new(kv: Arc<dyn KvStore>, bus: EventBus) -> StorageResult<Self> {
        Ok(Self {
            desired: ScopedKvStore::new(Arc::clone(&kv), DESIRED_NAMESPACE)?,
            configs: ScopedKvStore::new(Arc::clone(&kv), CONFIG_NAMESPACE)?,
            settings: ScopedKvStore::new(kv, SETTINGS_NAMESPACE)?,
            bus,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The bus this store publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // -----------------------------------------------------------------
    // Desired sets
    // -----------------------------------------------------------------

    /// The desired module set of `scope`, or `None` if the scope has no entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the entry is corrupt.
    pub async fn desired(&self, scope: &Scope) -> StorageResult<Option<Vec<ModuleId>>> {
        self.desired.get_json(&scope.storage_key()).await
    }

    /// The desired module set of `scope`, empty if the scope has no entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the entry is corrupt.
    pub async fn desired_or_empty(&self, scope: &Scope) -> StorageResult<Vec<ModuleId>> {
        Ok(self.desired(scope).await?.unwrap_or_default())
    }

    /// Create an empty entry for `scope` if none exists and return its set.
    ///
    /// Initializing an entry is not a change to the desired modules, so no
    /// notification is published.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn ensure_scope(&self, scope: &Scope) -> StorageResult<Vec<ModuleId>> {
        let _guard = self.write_lock.lock().await;
        if let Some(ids) = self.desired(scope).await? {
            return Ok(ids);
        }
        self.desired
            .set_json(&scope.storage_key(), &Vec::<ModuleId>::new())
            .await?;
        debug!(scope = %scope, "Initialized empty desired state");
        Ok(Vec::new())
    }

    /// Replace the desired set of `scope`.
    ///
    /// Duplicates are dropped, keeping first-occurrence order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OverlappingScope`] if `ids` is non-empty and
    /// an overlapping scope (see [`Scope::overlaps`]) has modules, or an
    /// error if the backend fails.
    pub async fn set_modules(&self, scope: &Scope, ids: Vec<ModuleId>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_desired(scope, dedup(ids)).await
    }

    /// Add `id` to the desired set of `scope`.
    ///
    /// If the module has catalog defaults and no stored configuration yet,
    /// the defaults are stored. Returns `true` if the module was not already
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OverlappingScope`] if an overlapping scope
    /// has modules, or an error if the backend fails.
    pub async fn enable_module(
        &self,
        scope: &Scope,
        id: &ModuleId,
        defaults: Option<&ModuleConfig>,
    ) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.check_overlap(scope).await?;

        if let Some(defaults) = defaults
            && self.module_config(id).await?.is_none()
        {
            self.configs.set_json(id.as_str(), defaults).await?;
            debug!(module_id = %id, "Stored default module config");
        }

        let mut ids = self.desired_or_empty(scope).await?;
        if ids.contains(id) {
            return Ok(false);
        }
        ids.push(id.clone());
        self.write_desired(scope, ids).await?;
        info!(scope = %scope, module_id = %id, "Module enabled");
        Ok(true)
    }

    /// Remove `id` from the desired set of `scope`.
    ///
    /// The module's configuration is kept for a later re-enable. Returns
    /// `true` if the module was enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn disable_module(&self, scope: &Scope, id: &ModuleId) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut ids = self.desired_or_empty(scope).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(false);
        }
        self.write_desired(scope, ids).await?;
        info!(scope = %scope, module_id = %id, "Module disabled");
        Ok(true)
    }

    /// Remove the entry of `scope` entirely.
    ///
    /// Returns `true` if the entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn remove_scope(&self, scope: &Scope) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;
        let existed = self.desired.delete(&scope.storage_key()).await?;
        if existed {
            self.notify(scope, None);
        }
        Ok(existed)
    }

    /// Every scope with a stored entry.
    ///
    /// Entries whose key does not parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn scopes(&self) -> StorageResult<Vec<Scope>> {
        let keys = self.desired.list_keys().await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| match Scope::from_storage_key(&key) {
                Ok(scope) => Some(scope),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed desired-state key");
                    None
                },
            })
            .collect())
    }

    /// Every stored scope of the given family.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn scopes_in_family(&self, mode: Mode) -> StorageResult<Vec<Scope>> {
        Ok(self
            .scopes()
            .await?
            .into_iter()
            .filter(|scope| scope.family() == mode)
            .collect())
    }

    /// The first non-empty stored scope overlapping `scope`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn overlapping_scope(&self, scope: &Scope) -> StorageResult<Option<Scope>> {
        for other in self.scopes().await? {
            if scope.overlaps(&other) && !self.desired_or_empty(&other).await?.is_empty() {
                return Ok(Some(other));
            }
        }
        Ok(None)
    }

    async fn check_overlap(&self, scope: &Scope) -> StorageResult<()> {
        match self.overlapping_scope(scope).await? {
            Some(existing) => {
                warn!(scope = %scope, existing = %existing, "Refusing overlapping scope");
                Err(StorageError::OverlappingScope {
                    scope: scope.to_string(),
                    existing: existing.to_string(),
                })
            },
            None => Ok(()),
        }
    }

    async fn write_desired(&self, scope: &Scope, ids: Vec<ModuleId>) -> StorageResult<()> {
        if !ids.is_empty() {
            self.check_overlap(scope).await?;
        }
        self.desired.set_json(&scope.storage_key(), &ids).await?;
        self.notify(scope, Some(ids));
        Ok(())
    }

    fn notify(&self, scope: &Scope, ids: Option<Vec<ModuleId>>) {
        self.bus.publish(PatchbayEvent::DesiredStateChanged {
            metadata: EventMetadata::new(EVENT_SOURCE),
            change: DesiredStateChange {
                scope_key: scope.clone(),
                new_module_ids: ids,
            },
        });
    }

    // -----------------------------------------------------------------
    // Module configuration
    // -----------------------------------------------------------------

    /// Stored configuration of `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the record is corrupt.
    pub async fn module_config(&self, id: &ModuleId) -> StorageResult<Option<ModuleConfig>> {
        self.configs.get_json(id.as_str()).await
    }

    /// Store the configuration of `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn set_module_config(&self, id: &ModuleId, config: &ModuleConfig) -> StorageResult<()> {
        self.configs.set_json(id.as_str(), config).await
    }

    /// Delete the configuration of `id`. Only an explicit user action
    /// should call this; disabling a module never does.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn delete_module_config(&self, id: &ModuleId) -> StorageResult<bool> {
        self.configs.delete(id.as_str()).await
    }

    // -----------------------------------------------------------------
    // Mode
    // -----------------------------------------------------------------

    /// The persisted mode ([`Mode::Standard`] if never set).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the record is corrupt.
    pub async fn mode(&self) -> StorageResult<Mode> {
        Ok(self.settings.get_json(MODE_KEY).await?.unwrap_or_default())
    }

    /// Persist `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn set_mode(&self, mode: Mode) -> StorageResult<()> {
        self.settings.set_json(MODE_KEY, &mode).await
    }
}

fn dedup(ids: Vec<ModuleId>) -> Vec<ModuleId> {
    let mut out: Vec<ModuleId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use patchbay_core::Origin;
    use patchbay_events::EventKind;
    use serde_json::json;

    fn store() -> DesiredStateStore {
        DesiredStateStore::new(Arc::new(MemoryKvStore::new()), EventBus::new()).unwrap()
    }

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id).unwrap()
    }

    fn example() -> Scope {
        Scope::Origin(Origin::parse("example.com").unwrap())
    }

    #[tokio::test]
    async fn test_enable_and_disable() {
        let store = store();
        assert!(store.enable_module(&example(), &module("a"), None).await.unwrap());
        assert!(!store.enable_module(&example(), &module("a"), None).await.unwrap());
        assert!(store.enable_module(&example(), &module("b"), None).await.unwrap());
        assert_eq!(
            store.desired(&example()).await.unwrap(),
            Some(vec![module("a"), module("b")])
        );

        assert!(store.disable_module(&example(), &module("a")).await.unwrap());
        assert!(!store.disable_module(&example(), &module("a")).await.unwrap());
        assert_eq!(store.desired_or_empty(&example()).await.unwrap(), vec![module("b")]);
    }

    #[tokio::test]
    async fn test_enable_stores_defaults_once() {
        let store = store();
        let defaults = ModuleConfig::default().with_capture("1", json!(["x"]));
        store
            .enable_module(&example(), &module("a"), Some(&defaults))
            .await
            .unwrap();

        let edited = ModuleConfig::default().with_value(5);
        store.set_module_config(&module("a"), &edited).await.unwrap();

        store
            .enable_module(&Scope::Global, &module("a"), Some(&defaults))
            .await
            .unwrap();
        assert_eq!(store.module_config(&module("a")).await.unwrap(), Some(edited));
    }

    #[tokio::test]
    async fn test_disable_preserves_config() {
        let store = store();
        let defaults = ModuleConfig::default().with_switch("breakpoint", true);
        store
            .enable_module(&example(), &module("a"), Some(&defaults))
            .await
            .unwrap();
        store.disable_module(&example(), &module("a")).await.unwrap();
        assert_eq!(store.module_config(&module("a")).await.unwrap(), Some(defaults));
    }

    #[tokio::test]
    async fn test_set_modules_dedups() {
        let store = store();
        store
            .set_modules(&Scope::Global, vec![module("b"), module("a"), module("b")])
            .await
            .unwrap();
        assert_eq!(
            store.desired_or_empty(&Scope::Global).await.unwrap(),
            vec![module("b"), module("a")]
        );
    }

    #[tokio::test]
    async fn test_changes_are_announced() {
        let store = store();
        let mut rx = store.bus().subscribe_kinds(&[EventKind::DesiredStateChanged]);

        store.enable_module(&example(), &module("a"), None).await.unwrap();
        store.remove_scope(&example()).await.unwrap();

        let first = rx.try_recv().unwrap();
        let PatchbayEvent::DesiredStateChanged { change, .. } = &*first else {
            panic!("expected desired state change");
        };
        assert_eq!(change.scope_key, example());
        assert_eq!(change.new_module_ids, Some(vec![module("a")]));

        let second = rx.try_recv().unwrap();
        let PatchbayEvent::DesiredStateChanged { change, .. } = &*second else {
            panic!("expected desired state change");
        };
        assert!(change.new_module_ids.is_none());
    }

    #[tokio::test]
    async fn test_ensure_scope_is_silent_and_idempotent() {
        let store = store();
        let mut rx = store.bus().subscribe();

        assert!(store.ensure_scope(&Scope::Global).await.unwrap().is_empty());
        assert_eq!(store.desired(&Scope::Global).await.unwrap(), Some(Vec::new()));
        assert!(rx.try_recv().is_none());

        store.set_modules(&Scope::Global, vec![module("a")]).await.unwrap();
        assert_eq!(store.ensure_scope(&Scope::Global).await.unwrap(), vec![module("a")]);
    }

    #[tokio::test]
    async fn test_scopes_by_family() {
        let store = store();
        store.enable_module(&example(), &module("a"), None).await.unwrap();
        store.enable_module(&Scope::Global, &module("b"), None).await.unwrap();

        assert_eq!(store.scopes().await.unwrap().len(), 2);
        assert_eq!(
            store.scopes_in_family(Mode::Standard).await.unwrap(),
            vec![example()]
        );
        assert_eq!(
            store.scopes_in_family(Mode::Global).await.unwrap(),
            vec![Scope::Global]
        );
    }

    #[tokio::test]
    async fn test_overlapping_scopes_are_refused() {
        let store = store();
        let https = Scope::Origin(Origin::parse("https://example.com").unwrap());
        store.enable_module(&example(), &module("a"), None).await.unwrap();

        let err = store.enable_module(&https, &module("a"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::OverlappingScope { .. }));
        let err = store.set_modules(&https, vec![module("b")]).await.unwrap_err();
        assert!(matches!(err, StorageError::OverlappingScope { .. }));
        assert!(store.desired(&https).await.unwrap().is_none());
        assert_eq!(store.overlapping_scope(&https).await.unwrap(), Some(example()));

        // Emptying the bare host frees the full origin.
        store.set_modules(&example(), Vec::new()).await.unwrap();
        store.set_modules(&https, vec![module("a")]).await.unwrap();
        let http = Scope::Origin(Origin::parse("http://example.com").unwrap());
        store.set_modules(&http, vec![module("a")]).await.unwrap();
        assert!(store.enable_module(&example(), &module("b"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_mode_defaults_to_standard() {
        let store = store();
        assert_eq!(store.mode().await.unwrap(), Mode::Standard);
        store.set_mode(Mode::Global).await.unwrap();
        assert_eq!(store.mode().await.unwrap(), Mode::Global);
    }

    #[tokio::test]
    async fn test_delete_module_config() {
        let store = store();
        store
            .set_module_config(&module("a"), &ModuleConfig::default().with_value(1))
            .await
            .unwrap();
        assert!(store.delete_module_config(&module("a")).await.unwrap());
        assert!(store.module_config(&module("a")).await.unwrap().is_none());
    }
}
