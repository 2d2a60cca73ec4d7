//! Patchbay Bridge - delivers module configuration into the page realm.
//!
//! The bridge runs once per navigation in a context that can reach the
//! desired-state store but not the page's own scripts. For the page's
//! active scope it:
//!
//! 1. mirrors the enabled-module list into the page-visible area, so
//!    immediate modules can discover themselves without waiting
//! 2. writes one `<prefix>_<moduleId>_<field>` key per deliverable field of
//!    every enabled module that has stored configuration
//! 3. posts a single `config_ready` broadcast listing exactly the modules
//!    written in step 2
//!
//! The broadcast is posted only after every write it vouches for. A store
//! failure before step 2 means no broadcast at all: configured modules stay
//! unpatched for this navigation and the page loads normally.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use tracing::{Instrument, debug, info};

use patchbay_core::{Mode, ModuleId, Origin, Scope};
use patchbay_page::{BridgeKeys, PageMessage, PageRealm, ReadySignal};
use patchbay_storage::{DesiredStateStore, StorageResult};
use patchbay_telemetry::NavigationContext;

/// What one bridge run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOutcome {
    /// The scope whose desired set was used, if it could be determined.
    pub scope: Option<Scope>,
    /// Every enabled module of that scope.
    pub enabled: Vec<ModuleId>,
    /// Modules whose configuration was written and announced.
    pub delivered: Vec<ModuleId>,
    /// Modules skipped because their configuration could not be read.
    pub skipped: Vec<ModuleId>,
    /// Whether the readiness broadcast was posted.
    pub broadcast: bool,
}

/// Copies per-module configuration into page realms.
#[derive(Debug, Clone)]
pub struct ConfigBridge {
    store: DesiredStateStore,
    keys: BridgeKeys,
}

impl ConfigBridge {
    /// Bridge reading from `store` and writing keys laid out by `keys`.
    #[must_use]
    pub fn new(store: DesiredStateStore, keys: BridgeKeys) -> Self {
        Self { store, keys }
    }

    /// Key layout this bridge writes.
    #[must_use]
    pub fn keys(&self) -> &BridgeKeys {
        &self.keys
    }

    /// The active scope for a page at `origin` and its desired modules.
    ///
    /// In standard mode the exact origin is tried first, then its bare
    /// host, so an entry stored as `example.com` applies to
    /// `https://example.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn resolve(&self, origin: &Origin) -> StorageResult<(Scope, Vec<ModuleId>)> {
        match self.store.mode().await? {
            Mode::Global => {
                let ids = self.store.desired_or_empty(&Scope::Global).await?;
                Ok((Scope::Global, ids))
            },
            Mode::Standard => {
                let exact = Scope::Origin(origin.clone());
                if let Some(ids) = self.store.desired(&exact).await? {
                    return Ok((exact, ids));
                }
                if origin.has_scheme() {
                    let host = Scope::Origin(origin.host());
                    if let Some(ids) = self.store.desired(&host).await? {
                        return Ok((host, ids));
                    }
                }
                Ok((exact, Vec::new()))
            },
        }
    }

    /// Run the bridge for one navigation.
    pub async fn on_navigation(&self, realm: &PageRealm) -> BridgeOutcome {
        let ctx = NavigationContext::new(realm.origin().clone())
            .with_navigation_id(realm.navigation_id());
        self.deliver(realm).instrument(ctx.span()).await
    }

    async fn deliver(&self, realm: &PageRealm) -> BridgeOutcome {
        let (scope, enabled) = match self.resolve(realm.origin()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(error = %e, "Desired state unavailable; page stays unconfigured");
                return BridgeOutcome::default();
            },
        };

        let storage = realm.storage();
        match serde_json::to_string(&enabled) {
            Ok(list) => storage.set(self.keys.enabled_key(), list),
            Err(e) => debug!(error = %e, "Could not mirror enabled modules"),
        }

        let mut delivered = Vec::new();
        let mut skipped = Vec::new();
        for id in &enabled {
            let config = match self.store.module_config(id).await {
                Ok(Some(config)) if config.is_deliverable() => config,
                Ok(_) => continue,
                Err(e) => {
                    debug!(module_id = %id, error = %e, "Module config unavailable; skipping");
                    skipped.push(id.clone());
                    continue;
                },
            };
            for field in config.bridge_fields() {
                storage.set(self.keys.field_key(id, &field.name), field.value);
            }
            delivered.push(id.clone());
        }

        let signal = PageMessage::ConfigReady(ReadySignal::new(delivered.clone()));
        let broadcast = match serde_json::to_value(&signal) {
            Ok(message) => realm.post_message(realm.window_id(), &message),
            Err(e) => {
                debug!(error = %e, "Could not encode readiness broadcast");
                false
            },
        };

        info!(
            scope = %scope,
            enabled = enabled.len(),
            delivered = delivered.len(),
            skipped = skipped.len(),
            "Bridged module configuration"
        );

        BridgeOutcome {
            scope: Some(scope),
            enabled,
            delivered,
            skipped,
            broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use patchbay_core::ModuleConfig;
    use patchbay_events::EventBus;
    use patchbay_storage::{KvStore, MemoryKvStore, StorageError};
    use serde_json::json;
    use std::sync::Arc;

    struct Unavailable;

    #[async_trait]
    impl KvStore for Unavailable {
        async fn get(&self, _: &str, _: &str) -> StorageResult<Option<Vec<u8>>> {
            Err(StorageError::Internal("offline".to_owned()))
        }
        async fn set(&self, _: &str, _: &str, _: Vec<u8>) -> StorageResult<()> {
            Err(StorageError::Internal("offline".to_owned()))
        }
        async fn delete(&self, _: &str, _: &str) -> StorageResult<bool> {
            Err(StorageError::Internal("offline".to_owned()))
        }
        async fn list_keys(&self, _: &str) -> StorageResult<Vec<String>> {
            Err(StorageError::Internal("offline".to_owned()))
        }
    }

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id).unwrap()
    }

    fn example() -> Origin {
        Origin::parse("example.com").unwrap()
    }

    fn setup() -> (Arc<MemoryKvStore>, DesiredStateStore, ConfigBridge) {
        let kv = Arc::new(MemoryKvStore::new());
        let store = DesiredStateStore::new(kv.clone(), EventBus::new()).unwrap();
        let bridge = ConfigBridge::new(store.clone(), BridgeKeys::default());
        (kv, store, bridge)
    }

    #[tokio::test]
    async fn test_writes_fields_then_broadcasts() {
        let (_, store, bridge) = setup();
        let scope = Scope::Origin(example());
        let config = ModuleConfig::default().with_capture("1", json!(["x", "y"]));
        store.enable_module(&scope, &module("A"), Some(&config)).await.unwrap();

        let realm = PageRealm::new(example());
        let outcome = bridge.on_navigation(&realm).await;

        assert!(outcome.broadcast);
        assert_eq!(outcome.delivered, vec![module("A")]);
        assert_eq!(
            realm.storage().get("__patchbay_A_flag"),
            Some("1".to_owned())
        );
        assert_eq!(
            realm.storage().get("__patchbay_A_param"),
            Some(r#"["x","y"]"#.to_owned())
        );
        assert!(realm.readiness().signalled.contains(&module("A")));
    }

    #[tokio::test]
    async fn test_unconfigured_module_is_mirrored_not_announced() {
        let (_, store, bridge) = setup();
        let scope = Scope::Origin(example());
        store.enable_module(&scope, &module("ua"), None).await.unwrap();

        let realm = PageRealm::new(example());
        let outcome = bridge.on_navigation(&realm).await;

        assert!(outcome.broadcast);
        assert!(outcome.delivered.is_empty());
        assert_eq!(realm.enabled_modules(bridge.keys()), vec![module("ua")]);
        assert_eq!(realm.readiness().broadcasts, 1);
        assert!(realm.readiness().signalled.is_empty());
    }

    #[tokio::test]
    async fn test_ui_only_field_never_reaches_page() {
        let (_, store, bridge) = setup();
        let scope = Scope::Origin(example());
        let mut config = ModuleConfig::default().with_switch("breakpoint", true);
        config.keyword_filter_enabled = true;
        store.enable_module(&scope, &module("A"), Some(&config)).await.unwrap();

        let realm = PageRealm::new(example());
        bridge.on_navigation(&realm).await;

        assert_eq!(
            realm.storage().get("__patchbay_A_breakpoint"),
            Some("true".to_owned())
        );
        assert!(
            realm
                .storage()
                .keys()
                .iter()
                .all(|k| !k.contains("keywordFilterEnabled"))
        );
    }

    #[tokio::test]
    async fn test_store_failure_sends_no_broadcast() {
        let store = DesiredStateStore::new(Arc::new(Unavailable), EventBus::new()).unwrap();
        let bridge = ConfigBridge::new(store, BridgeKeys::default());

        let realm = PageRealm::new(example());
        let outcome = bridge.on_navigation(&realm).await;

        assert_eq!(outcome, BridgeOutcome::default());
        assert_eq!(realm.readiness().broadcasts, 0);
        assert!(realm.storage().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_config_is_skipped() {
        let (kv, store, bridge) = setup();
        let scope = Scope::Origin(example());
        store
            .set_modules(&scope, vec![module("A"), module("B")])
            .await
            .unwrap();
        kv.set("module_config", "A", b"{broken".to_vec()).await.unwrap();
        store
            .set_module_config(&module("B"), &ModuleConfig::default().with_value(3))
            .await
            .unwrap();

        let realm = PageRealm::new(example());
        let outcome = bridge.on_navigation(&realm).await;

        assert_eq!(outcome.skipped, vec![module("A")]);
        assert_eq!(outcome.delivered, vec![module("B")]);
        assert!(!realm.readiness().signalled.contains(&module("A")));
    }

    #[tokio::test]
    async fn test_global_mode_uses_global_scope() {
        let (_, store, bridge) = setup();
        store
            .enable_module(&Scope::Origin(example()), &module("A"), None)
            .await
            .unwrap();
        store.enable_module(&Scope::Global, &module("G"), None).await.unwrap();
        store.set_mode(Mode::Global).await.unwrap();

        let realm = PageRealm::new(example());
        let outcome = bridge.on_navigation(&realm).await;

        assert_eq!(outcome.scope, Some(Scope::Global));
        assert_eq!(outcome.enabled, vec![module("G")]);
    }

    #[tokio::test]
    async fn test_full_origin_falls_back_to_host_entry() {
        let (_, store, bridge) = setup();
        store
            .enable_module(&Scope::Origin(example()), &module("A"), None)
            .await
            .unwrap();

        let realm = PageRealm::new(Origin::parse("https://example.com/login").unwrap());
        let outcome = bridge.on_navigation(&realm).await;

        assert_eq!(outcome.scope, Some(Scope::Origin(example())));
        assert_eq!(outcome.enabled, vec![module("A")]);
    }
}
