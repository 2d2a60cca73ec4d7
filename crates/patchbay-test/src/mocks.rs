//! Mock implementations for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use patchbay_coordinator::{
    ExecutionWorld, HostError, HostResult, RunAt, ScriptHost, ScriptRegistration,
};
use patchbay_core::{InjectionId, ModuleId};
use patchbay_page::{
    Activation, BridgedSettings, CapabilityModule, ModuleError, ModuleResult, PageRealm,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One call made against a [`MockScriptHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    /// `register` with this request.
    Register(ScriptRegistration),
    /// `unregister` of this id.
    Unregister(InjectionId),
}

impl HostCall {
    /// The injection id the call targeted.
    #[must_use]
    pub fn injection_id(&self) -> &InjectionId {
        match self {
            Self::Register(script) => &script.id,
            Self::Unregister(id) => id,
        }
    }
}

/// In-memory [`ScriptHost`] that records every call.
///
/// Clones share state, so a test can keep one handle while the coordinator
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MockScriptHost {
    live: Arc<Mutex<BTreeMap<InjectionId, ScriptRegistration>>>,
    calls: Arc<Mutex<Vec<HostCall>>>,
    failing_modules: Arc<Mutex<BTreeSet<ModuleId>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl MockScriptHost {
    /// Empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `register` for `module_id`.
    #[must_use]
    pub fn with_failing_module(self, module_id: ModuleId) -> Self {
        self.fail_module(module_id);
        self
    }

    /// Pre-seed a registration left behind by an earlier process.
    #[must_use]
    pub fn with_survivor(self, raw_id: &str, module_id: ModuleId) -> Self {
        let id = InjectionId::from_raw(raw_id);
        lock(&self.live).insert(
            id.clone(),
            ScriptRegistration {
                id,
                module_id,
                matches: vec!["<all_urls>".to_owned()],
                run_at: RunAt::DocumentStart,
                world: ExecutionWorld::Main,
                all_frames: false,
            },
        );
        self
    }

    /// Start rejecting `register` for `module_id`.
    pub fn fail_module(&self, module_id: ModuleId) {
        lock(&self.failing_modules).insert(module_id);
    }

    /// Stop rejecting `register` for `module_id`.
    pub fn recover_module(&self, module_id: &ModuleId) {
        lock(&self.failing_modules).remove(module_id);
    }

    /// Make `id` vanish from the host as if the browser dropped it. The next
    /// `unregister` of it reports [`HostError::NotFound`].
    pub fn drop_externally(&self, id: &InjectionId) {
        lock(&self.live).remove(id);
    }

    /// Make every call fail with [`HostError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    /// Forget recorded calls (live registrations are kept).
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Module ids of every `register` call, in order.
    #[must_use]
    pub fn registered_modules(&self) -> Vec<ModuleId> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                HostCall::Register(script) => Some(script.module_id.clone()),
                HostCall::Unregister(_) => None,
            })
            .collect()
    }

    /// Ids of every `unregister` call, in order.
    #[must_use]
    pub fn unregistered_ids(&self) -> Vec<InjectionId> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                HostCall::Unregister(id) => Some(id.clone()),
                HostCall::Register(_) => None,
            })
            .collect()
    }

    /// Registrations currently live in the host.
    #[must_use]
    pub fn live(&self) -> Vec<ScriptRegistration> {
        lock(&self.live).values().cloned().collect()
    }

    /// Live registrations whose match patterns include `pattern`.
    #[must_use]
    pub fn live_matching(&self, pattern: &str) -> Vec<ScriptRegistration> {
        lock(&self.live)
            .values()
            .filter(|s| s.matches.iter().any(|m| m == pattern))
            .cloned()
            .collect()
    }

    /// Whether `id` is live.
    #[must_use]
    pub fn is_live(&self, id: &InjectionId) -> bool {
        lock(&self.live).contains_key(id)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    fn check_available(&self, what: &str) -> HostResult<()> {
        if *lock(&self.unavailable) {
            return Err(HostError::Unavailable(what.to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptHost for MockScriptHost {
    async fn register(&self, script: ScriptRegistration) -> HostResult<()> {
        lock(&self.calls).push(HostCall::Register(script.clone()));
        self.check_available(script.id.as_str())?;
        if lock(&self.failing_modules).contains(&script.module_id) {
            return Err(HostError::Rejected(format!(
                "module {} refused by mock host",
                script.module_id
            )));
        }
        let mut live = lock(&self.live);
        if live.contains_key(&script.id) {
            return Err(HostError::Rejected(format!("duplicate id {}", script.id)));
        }
        live.insert(script.id.clone(), script);
        Ok(())
    }

    async fn unregister(&self, id: &InjectionId) -> HostResult<()> {
        lock(&self.calls).push(HostCall::Unregister(id.clone()));
        self.check_available(id.as_str())?;
        if lock(&self.live).remove(id).is_some() {
            return Ok(());
        }
        Err(HostError::NotFound(id.to_string()))
    }

    async fn registered_ids(&self) -> HostResult<Vec<InjectionId>> {
        self.check_available("registered_ids")?;
        Ok(lock(&self.live).keys().cloned().collect())
    }
}

/// Capability module that records every activation.
///
/// When given an API name it patches that API with an interceptor returning
/// the module id, the settings it captured at install time, and the call
/// arguments.
#[derive(Debug)]
pub struct RecordingModule {
    id: ModuleId,
    activation: Activation,
    patch_api: Option<String>,
    fail_install: bool,
    installs: AtomicUsize,
    seen: Mutex<Vec<BridgedSettings>>,
}

impl RecordingModule {
    /// Module that activates without configuration.
    #[must_use]
    pub fn immediate(id: ModuleId) -> Self {
        Self::with_activation(id, Activation::Immediate)
    }

    /// Module that waits for `fields` to be bridged.
    #[must_use]
    pub fn configured<I, S>(id: ModuleId, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_activation(id, Activation::configured(fields))
    }

    fn with_activation(id: ModuleId, activation: Activation) -> Self {
        Self {
            id,
            activation,
            patch_api: None,
            fail_install: false,
            installs: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Patch `api` on install.
    #[must_use]
    pub fn patching(mut self, api: impl Into<String>) -> Self {
        self.patch_api = Some(api.into());
        self
    }

    /// Fail every install.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_install = true;
        self
    }

    /// How many times `install` ran.
    #[must_use]
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    /// Settings passed to each install, in order.
    #[must_use]
    pub fn seen_settings(&self) -> Vec<BridgedSettings> {
        lock(&self.seen).clone()
    }

    /// Settings of the most recent install.
    #[must_use]
    pub fn last_settings(&self) -> Option<BridgedSettings> {
        lock(&self.seen).last().cloned()
    }

    fn snapshot(&self, settings: &BridgedSettings) -> Value {
        let Activation::Configured { fields } = &self.activation else {
            return Value::Object(Map::new());
        };
        let captured: Map<String, Value> = fields
            .iter()
            .filter_map(|f| {
                settings
                    .get(f)
                    .map(|v| (f.clone(), Value::String(v.to_owned())))
            })
            .collect();
        Value::Object(captured)
    }
}

impl CapabilityModule for RecordingModule {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn activation(&self) -> Activation {
        self.activation.clone()
    }

    fn install(&self, realm: &PageRealm, settings: &BridgedSettings) -> ModuleResult<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(settings.clone());

        if self.fail_install {
            return Err(ModuleError::Install(format!(
                "{} configured to fail",
                self.id
            )));
        }

        if let Some(api) = &self.patch_api {
            let module = self.id.to_string();
            let captured = self.snapshot(settings);
            realm.apis().install(
                api,
                Arc::new(move |args: &Value| {
                    Some(json!({
                        "module": module,
                        "settings": captured,
                        "args": args,
                    }))
                }),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{test_module_id, test_origin};

    fn script(id: &str, module: &str) -> ScriptRegistration {
        ScriptRegistration {
            id: InjectionId::from_raw(id),
            module_id: test_module_id(module),
            matches: vec!["*://example.com/*".to_owned()],
            run_at: RunAt::DocumentStart,
            world: ExecutionWorld::Main,
            all_frames: false,
        }
    }

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let host = MockScriptHost::new();
        host.register(script("patchbay-1", "A")).await.unwrap();
        host.unregister(&InjectionId::from_raw("patchbay-1"))
            .await
            .unwrap();

        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], HostCall::Register(_)));
        assert_eq!(
            calls[1],
            HostCall::Unregister(InjectionId::from_raw("patchbay-1"))
        );
        assert_eq!(host.live_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_module_rejected() {
        let host = MockScriptHost::new().with_failing_module(test_module_id("A"));
        let err = host.register(script("patchbay-1", "A")).await.unwrap_err();
        assert!(matches!(err, HostError::Rejected(_)));
        assert_eq!(host.live_count(), 0);

        host.recover_module(&test_module_id("A"));
        host.register(script("patchbay-1", "A")).await.unwrap();
        assert_eq!(host.live_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_id_reports_not_found() {
        let host = MockScriptHost::new();
        host.register(script("patchbay-1", "A")).await.unwrap();
        let id = InjectionId::from_raw("patchbay-1");
        host.drop_externally(&id);

        let err = host.unregister(&id).await.unwrap_err();
        assert!(err.is_already_gone());
    }

    #[tokio::test]
    async fn test_survivor_is_listed() {
        let host = MockScriptHost::new().with_survivor("patchbay-old", test_module_id("A"));
        let ids = host.registered_ids().await.unwrap();
        assert_eq!(ids, vec![InjectionId::from_raw("patchbay-old")]);
    }

    #[tokio::test]
    async fn test_unavailable_host() {
        let host = MockScriptHost::new();
        host.set_unavailable(true);
        assert!(matches!(
            host.registered_ids().await,
            Err(HostError::Unavailable(_))
        ));
    }

    #[test]
    fn test_recording_module_patches_with_captured_settings() {
        let module = RecordingModule::configured(test_module_id("A"), ["flag"]).patching("fetch");
        let realm = PageRealm::new(test_origin("example.com"));
        let settings = BridgedSettings::from_fields(
            test_module_id("A"),
            [("flag".to_owned(), "1".to_owned())].into_iter().collect(),
        );

        module.install(&realm, &settings).unwrap();

        let out = realm.apis().call("fetch", &json!(["/api"])).unwrap();
        assert_eq!(out["module"], "A");
        assert_eq!(out["settings"]["flag"], "1");
        assert_eq!(module.install_count(), 1);
        assert_eq!(module.last_settings(), Some(settings));
    }

    #[test]
    fn test_failing_module_reports_error() {
        let module = RecordingModule::immediate(test_module_id("A")).failing();
        let realm = PageRealm::new(test_origin("example.com"));
        let result = module.install(&realm, &BridgedSettings::empty(test_module_id("A")));
        assert!(matches!(result, Err(ModuleError::Install(_))));
        assert_eq!(module.install_count(), 1);
    }
}
