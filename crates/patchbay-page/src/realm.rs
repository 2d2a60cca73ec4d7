//! The page's own execution realm for one navigation.
//!
//! A [`PageRealm`] lives exactly as long as one navigation. Everything
//! in it is per-navigation: the page-visible key/value area, the latched
//! readiness state, the set of modules that already drained their
//! configuration, and the patched API surface. A new navigation gets a new
//! realm, which is how the area is "cleared implicitly".

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};
use uuid::Uuid;

use patchbay_core::{ModuleId, Origin};

use crate::apis::PageApis;
use crate::keys::BridgeKeys;
use crate::message::{CapturePayload, PageMessage, ReadySignal, WindowId};

/// Capacity of the outbound capture channel.
const CAPTURE_CHANNEL_CAPACITY: usize = 256;

/// The page-visible key/value area.
///
/// Reachable from the page's own scripts, so anything left here is visible
/// to the host site.
#[derive(Debug, Default)]
pub struct PageStorage {
    entries: DashMap<String, String>,
}

impl PageStorage {
    /// Read a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Write a key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove a key, returning its value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Remove every key starting with `prefix`, returning how many went.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Every key, sorted. This is what a page enumerating its storage sees.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the area is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Latched readiness state of one navigation.
///
/// Broadcasts accumulate, so a module that starts waiting after the bridge
/// already announced it still observes its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Union of every module id announced so far.
    pub signalled: BTreeSet<ModuleId>,
    /// Number of readiness broadcasts received.
    pub broadcasts: usize,
    /// Set when the navigation ends.
    pub unloaded: bool,
}

/// One navigation's page realm.
#[derive(Debug)]
pub struct PageRealm {
    navigation_id: Uuid,
    window: WindowId,
    origin: Origin,
    storage: PageStorage,
    readiness: watch::Sender<Readiness>,
    consumed: DashSet<ModuleId>,
    apis: PageApis,
    captures: broadcast::Sender<Arc<CapturePayload>>,
}

impl PageRealm {
    /// A fresh realm for a navigation to `origin`.
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        let (readiness, _) = watch::channel(Readiness::default());
        let (captures, _) = broadcast::channel(CAPTURE_CHANNEL_CAPACITY);
        Self {
            navigation_id: Uuid::new_v4(),
            window: WindowId::new(),
            origin,
            storage: PageStorage::default(),
            readiness,
            consumed: DashSet::new(),
            apis: PageApis::default(),
            captures,
        }
    }

    /// Id of this navigation.
    #[must_use]
    pub fn navigation_id(&self) -> Uuid {
        self.navigation_id
    }

    /// This realm's window.
    #[must_use]
    pub fn window_id(&self) -> WindowId {
        self.window
    }

    /// Origin of the loaded page.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The page-visible key/value area.
    #[must_use]
    pub fn storage(&self) -> &PageStorage {
        &self.storage
    }

    /// The patchable API surface.
    #[must_use]
    pub fn apis(&self) -> &PageApis {
        &self.apis
    }

    // -----------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------

    /// Deliver an in-realm message posted by `source`.
    ///
    /// Only messages from this realm's own window are honoured. Returns
    /// `true` if the message was a readiness broadcast that was accepted.
    pub fn post_message(&self, source: WindowId, data: &Value) -> bool {
        if source != self.window {
            debug!(source = %source, window = %self.window, "Ignoring message from another window");
            return false;
        }

        match serde_json::from_value::<PageMessage>(data.clone()) {
            Ok(PageMessage::ConfigReady(signal)) => {
                self.accept_ready(signal);
                true
            },
            Err(e) => {
                trace!(error = %e, "Ignoring unrecognized page message");
                false
            },
        }
    }

    fn accept_ready(&self, signal: ReadySignal) {
        debug!(
            navigation_id = %self.navigation_id,
            modules = signal.module_ids.len(),
            "Readiness broadcast received"
        );
        self.readiness.send_modify(|state| {
            state.signalled.extend(signal.module_ids);
            state.broadcasts = state.broadcasts.saturating_add(1);
        });
    }

    /// Snapshot of the readiness state.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness.borrow().clone()
    }

    /// Wait until a readiness broadcast lists `id`.
    ///
    /// Returns `false` if the navigation ends first.
    pub async fn wait_for_signal(&self, id: &ModuleId) -> bool {
        let mut rx = self.readiness.subscribe();
        match rx
            .wait_for(|state| state.unloaded || state.signalled.contains(id))
            .await
        {
            Ok(state) => state.signalled.contains(id),
            Err(_) => false,
        }
    }

    /// End the navigation. Modules still waiting give up.
    pub fn unload(&self) {
        self.readiness.send_modify(|state| state.unloaded = true);
    }

    // -----------------------------------------------------------------
    // Configuration delivery
    // -----------------------------------------------------------------

    /// Claim the right to drain `id`'s bridged configuration.
    ///
    /// Returns `true` exactly once per module per navigation.
    pub fn claim_config(&self, id: &ModuleId) -> bool {
        self.consumed.insert(id.clone())
    }

    /// Whether `id` already drained its configuration.
    #[must_use]
    pub fn is_consumed(&self, id: &ModuleId) -> bool {
        self.consumed.contains(id)
    }

    /// The mirrored list of enabled modules.
    ///
    /// Empty if the bridge has not written it or it is malformed.
    #[must_use]
    pub fn enabled_modules(&self, keys: &BridgeKeys) -> Vec<ModuleId> {
        let Some(raw) = self.storage.get(&keys.enabled_key()) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!(error = %e, "Malformed enabled-module mirror");
            Vec::new()
        })
    }

    // -----------------------------------------------------------------
    // Capture reporting
    // -----------------------------------------------------------------

    /// Subscribe to data captured by modules in this realm.
    #[must_use]
    pub fn subscribe_captures(&self) -> broadcast::Receiver<Arc<CapturePayload>> {
        self.captures.subscribe()
    }

    /// Send data captured by `module_id` out of the realm.
    ///
    /// Data that cannot be serialized is reported as
    /// [`CapturePayload::Error`] instead of being dropped. Returns the
    /// number of listeners that received the payload.
    pub fn report_capture<T: Serialize + ?Sized>(
        &self,
        module_id: &ModuleId,
        api: &str,
        data: &T,
    ) -> usize {
        let payload = match serde_json::to_value(data) {
            Ok(data) => CapturePayload::Data {
                module_id: module_id.clone(),
                api: api.to_owned(),
                data,
            },
            Err(e) => {
                debug!(module_id = %module_id, api, error = %e, "Capture could not be serialized");
                CapturePayload::Error {
                    module_id: module_id.clone(),
                    api: api.to_owned(),
                    kind: "serialization".to_owned(),
                    message: e.to_string(),
                }
            },
        };
        self.captures.send(Arc::new(payload)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn realm() -> PageRealm {
        PageRealm::new(Origin::parse("example.com").unwrap())
    }

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id).unwrap()
    }

    fn ready(ids: &[&str]) -> Value {
        json!({"event": "config_ready", "moduleIds": ids})
    }

    #[test]
    fn test_storage_basics() {
        let realm = realm();
        realm.storage().set("b", "2");
        realm.storage().set("a", "1");
        assert_eq!(realm.storage().keys(), vec!["a", "b"]);
        assert_eq!(realm.storage().remove("a"), Some("1".to_owned()));
        assert!(!realm.storage().contains("a"));
        assert_eq!(realm.storage().len(), 1);

        realm.storage().set("x_A_flag", "1");
        realm.storage().set("x_A_extra", "2");
        realm.storage().set("x_AB_flag", "3");
        assert_eq!(realm.storage().remove_prefix("x_A_"), 2);
        assert_eq!(realm.storage().keys(), vec!["b", "x_AB_flag"]);
    }

    #[test]
    fn test_message_from_other_window_ignored() {
        let realm = realm();
        assert!(!realm.post_message(WindowId::new(), &ready(&["A"])));
        assert_eq!(realm.readiness().broadcasts, 0);
    }

    #[test]
    fn test_unrelated_message_ignored() {
        let realm = realm();
        assert!(!realm.post_message(realm.window_id(), &json!({"hello": "world"})));
        assert_eq!(realm.readiness(), Readiness::default());
    }

    #[test]
    fn test_broadcasts_accumulate() {
        let realm = realm();
        assert!(realm.post_message(realm.window_id(), &ready(&["A"])));
        assert!(realm.post_message(realm.window_id(), &ready(&["B"])));

        let state = realm.readiness();
        assert_eq!(state.broadcasts, 2);
        assert!(state.signalled.contains(&module("A")));
        assert!(state.signalled.contains(&module("B")));
    }

    #[tokio::test]
    async fn test_late_waiter_sees_latched_signal() {
        let realm = realm();
        realm.post_message(realm.window_id(), &ready(&["A"]));
        assert!(realm.wait_for_signal(&module("A")).await);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_broadcast() {
        let realm = Arc::new(realm());
        let waiter = {
            let realm = Arc::clone(&realm);
            tokio::spawn(async move { realm.wait_for_signal(&module("A")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        realm.post_message(realm.window_id(), &ready(&["A"]));
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_unload_releases_waiters() {
        let realm = Arc::new(realm());
        let waiter = {
            let realm = Arc::clone(&realm);
            tokio::spawn(async move { realm.wait_for_signal(&module("A")).await })
        };
        realm.post_message(realm.window_id(), &ready(&["B"]));
        realm.unload();
        assert!(!waiter.await.unwrap());
    }

    #[test]
    fn test_claim_config_once() {
        let realm = realm();
        assert!(realm.claim_config(&module("A")));
        assert!(!realm.claim_config(&module("A")));
        assert!(realm.is_consumed(&module("A")));
    }

    #[test]
    fn test_enabled_modules_mirror() {
        let realm = realm();
        let keys = BridgeKeys::default();
        assert!(realm.enabled_modules(&keys).is_empty());

        realm.storage().set(keys.enabled_key(), r#"["A","B"]"#);
        assert_eq!(realm.enabled_modules(&keys), vec![module("A"), module("B")]);

        realm.storage().set(keys.enabled_key(), "not json");
        assert!(realm.enabled_modules(&keys).is_empty());
    }

    #[test]
    fn test_report_capture_data() {
        let realm = realm();
        let mut rx = realm.subscribe_captures();
        assert_eq!(realm.report_capture(&module("A"), "canvas.toDataURL", &json!({"w": 1})), 1);

        let payload = rx.try_recv().unwrap();
        assert!(!payload.is_error());
        assert_eq!(payload.module_id(), &module("A"));
    }

    #[test]
    fn test_report_capture_unserializable_becomes_error_payload() {
        let realm = realm();
        let mut rx = realm.subscribe_captures();

        let mut bad: BTreeMap<Vec<u8>, u8> = BTreeMap::new();
        bad.insert(vec![1, 2], 3);
        realm.report_capture(&module("A"), "fetch", &bad);

        let payload = rx.try_recv().unwrap();
        let CapturePayload::Error { kind, api, .. } = &*payload else {
            panic!("expected error payload");
        };
        assert_eq!(kind, "serialization");
        assert_eq!(api, "fetch");
    }

    #[test]
    fn test_report_capture_without_listeners() {
        let realm = realm();
        assert_eq!(realm.report_capture(&module("A"), "fetch", &1), 0);
    }
}
