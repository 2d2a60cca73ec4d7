//! Capability module activation protocol.
//!
//! Every injectable module implements [`CapabilityModule`] and declares an
//! [`Activation`] variant:
//!
//! - [`Activation::Immediate`]: installs its patch at load time, never waits
//!   and never reads bridged state.
//! - [`Activation::Configured`]: waits for a readiness broadcast listing its
//!   id, reads its declared fields from the page-visible area, installs its
//!   patch with those values captured, then erases every key under its
//!   `<prefix>_<moduleId>_` namespace, declared or not.
//!
//! Activation happens at most once per module per navigation. Two guards
//! enforce that: the [`ActivationGuard`] token owned by each
//! [`ModuleLoader`], and the realm's per-navigation consumed set, which
//! stops a second loader for the same module from draining the
//! configuration again.
//!
//! Nothing here propagates an error to the page. Failures end up as
//! [`ActivationOutcome::Failed`] and the page stays unpatched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use tracing::{debug, info, warn};

use patchbay_core::ModuleId;

use crate::error::ModuleResult;
use crate::keys::BridgeKeys;
use crate::realm::PageRealm;
use crate::settings::BridgedSettings;

/// How a module becomes active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// No configuration; patch unconditionally at load time.
    Immediate,
    /// Wait for bridged configuration.
    Configured {
        /// Field names the module reads (e.g. `flag`, `param`, `breakpoint`).
        fields: Vec<String>,
    },
}

impl Activation {
    /// Configured activation reading `fields`.
    #[must_use]
    pub fn configured<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Configured {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// An injectable unit that patches one page API or behaviour.
pub trait CapabilityModule: Send + Sync {
    /// Module id.
    fn id(&self) -> &ModuleId;

    /// How the module activates.
    fn activation(&self) -> Activation;

    /// Install the patch. Values the patch needs must be captured from
    /// `settings` now; later changes to the page-visible area must not
    /// affect an installed patch.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch cannot be installed. The runtime logs
    /// it and leaves the page unpatched.
    fn install(&self, realm: &PageRealm, settings: &BridgedSettings) -> ModuleResult<()>;
}

/// Result of one activation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The patch is installed.
    Activated,
    /// The module already activated (or is activating) in this navigation.
    AlreadyActive,
    /// The navigation ended without a readiness broadcast listing the module.
    NotSignalled,
    /// Installing the patch failed.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl ActivationOutcome {
    /// Whether the patch was installed by this attempt.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

/// Explicit one-shot activation token.
///
/// Cloning shares the token.
#[derive(Debug, Clone, Default)]
pub struct ActivationGuard {
    entered: Arc<AtomicBool>,
}

impl ActivationGuard {
    /// A fresh, unentered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section. Returns `false` if already entered.
    pub fn try_enter(&self) -> bool {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the token was entered.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Loads one module into one realm.
pub struct ModuleLoader {
    module: Arc<dyn CapabilityModule>,
    realm: Arc<PageRealm>,
    keys: BridgeKeys,
    guard: ActivationGuard,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("module_id", self.module.id())
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Loader for `module` in `realm`.
    #[must_use]
    pub fn new(module: Arc<dyn CapabilityModule>, realm: Arc<PageRealm>, keys: BridgeKeys) -> Self {
        Self {
            module,
            realm,
            keys,
            guard: ActivationGuard::new(),
        }
    }

    /// The loader's activation token.
    #[must_use]
    pub fn guard(&self) -> &ActivationGuard {
        &self.guard
    }

    /// Run the activation protocol.
    ///
    /// Calling this again, concurrently or later, returns
    /// [`ActivationOutcome::AlreadyActive`].
    pub async fn load(&self) -> ActivationOutcome {
        if !self.guard.try_enter() {
            return ActivationOutcome::AlreadyActive;
        }

        let id = self.module.id().clone();
        match self.module.activation() {
            Activation::Immediate => self.install(&BridgedSettings::empty(id)),
            Activation::Configured { fields } => self.load_configured(id, &fields).await,
        }
    }

    async fn load_configured(&self, id: ModuleId, fields: &[String]) -> ActivationOutcome {
        if !self.realm.wait_for_signal(&id).await {
            debug!(module_id = %id, "Navigation ended before readiness; module stays inactive");
            return ActivationOutcome::NotSignalled;
        }

        if !self.realm.claim_config(&id) {
            debug!(module_id = %id, "Configuration already drained in this navigation");
            return ActivationOutcome::AlreadyActive;
        }

        let storage = self.realm.storage();
        let keyed: Vec<(&String, String)> = fields
            .iter()
            .map(|field| (field, self.keys.field_key(&id, field)))
            .collect();

        let read: BTreeMap<String, String> = keyed
            .iter()
            .filter_map(|(field, key)| storage.get(key).map(|v| ((*field).clone(), v)))
            .collect();
        let settings = BridgedSettings::from_fields(id.clone(), read);

        let outcome = self.install(&settings);

        let erased = storage.remove_prefix(&self.keys.module_prefix(&id));
        debug!(module_id = %id, erased, "Configuration keys erased");
        outcome
    }

    fn install(&self, settings: &BridgedSettings) -> ActivationOutcome {
        let id = settings.module_id();
        match self.module.install(&self.realm, settings) {
            Ok(()) => {
                info!(module_id = %id, fields = settings.len(), "Module activated");
                ActivationOutcome::Activated
            },
            Err(e) => {
                warn!(module_id = %id, error = %e, "Module failed to install; page left unpatched");
                ActivationOutcome::Failed {
                    reason: e.to_string(),
                }
            },
        }
    }
}

/// Per-navigation module runtime.
#[derive(Debug, Clone)]
pub struct ModuleRuntime {
    realm: Arc<PageRealm>,
    keys: BridgeKeys,
}

impl ModuleRuntime {
    /// Runtime for `realm` reading keys laid out by `keys`.
    #[must_use]
    pub fn new(realm: Arc<PageRealm>, keys: BridgeKeys) -> Self {
        Self { realm, keys }
    }

    /// The realm modules are loaded into.
    #[must_use]
    pub fn realm(&self) -> &Arc<PageRealm> {
        &self.realm
    }

    /// A loader for `module`.
    #[must_use]
    pub fn loader(&self, module: Arc<dyn CapabilityModule>) -> ModuleLoader {
        ModuleLoader::new(module, Arc::clone(&self.realm), self.keys.clone())
    }

    /// The candidates the page may discover: those in the enabled-module
    /// mirror. Readable before any readiness broadcast.
    #[must_use]
    pub fn discoverable(
        &self,
        candidates: &[Arc<dyn CapabilityModule>],
    ) -> Vec<Arc<dyn CapabilityModule>> {
        let enabled = self.realm.enabled_modules(&self.keys);
        candidates
            .iter()
            .filter(|m| enabled.contains(m.id()))
            .cloned()
            .collect()
    }

    /// Load every module concurrently and collect the outcomes in input
    /// order.
    pub async fn activate_all(
        &self,
        modules: &[Arc<dyn CapabilityModule>],
    ) -> Vec<(ModuleId, ActivationOutcome)> {
        let loaders: Vec<ModuleLoader> = modules.iter().map(|m| self.loader(Arc::clone(m))).collect();
        let outcomes = join_all(loaders.iter().map(ModuleLoader::load)).await;
        modules
            .iter()
            .map(|m| m.id().clone())
            .zip(outcomes)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModuleError;
    use crate::message::ReadySignal;
    use patchbay_core::Origin;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct TestModule {
        id: ModuleId,
        activation: Activation,
        fail: bool,
        seen: Mutex<Vec<BridgedSettings>>,
    }

    impl TestModule {
        fn new(id: &str, activation: Activation) -> Arc<Self> {
            Arc::new(Self {
                id: ModuleId::new(id).unwrap(),
                activation,
                fail: false,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: ModuleId::new(id).unwrap(),
                activation: Activation::Immediate,
                fail: true,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl CapabilityModule for TestModule {
        fn id(&self) -> &ModuleId {
            &self.id
        }

        fn activation(&self) -> Activation {
            self.activation.clone()
        }

        fn install(&self, realm: &PageRealm, settings: &BridgedSettings) -> ModuleResult<()> {
            if self.fail {
                return Err(ModuleError::Install("boom".to_owned()));
            }
            self.seen.lock().unwrap().push(settings.clone());
            let flag = settings.flag().map(str::to_owned);
            realm.apis().install(
                self.id.as_str(),
                Arc::new(move |_: &Value| flag.clone().map(Value::String)),
            )
        }
    }

    fn runtime() -> ModuleRuntime {
        let realm = Arc::new(PageRealm::new(Origin::parse("example.com").unwrap()));
        ModuleRuntime::new(realm, BridgeKeys::default())
    }

    fn broadcast(runtime: &ModuleRuntime, ids: &[&str]) {
        let signal = ReadySignal::new(ids.iter().map(|id| ModuleId::new(*id).unwrap()).collect());
        let value = serde_json::to_value(crate::message::PageMessage::ConfigReady(signal)).unwrap();
        let realm = runtime.realm();
        realm.post_message(realm.window_id(), &value);
    }

    #[tokio::test]
    async fn test_immediate_activates_without_signal() {
        let runtime = runtime();
        let module = TestModule::new("ua", Activation::Immediate);
        let loader = runtime.loader(module.clone());

        assert_eq!(loader.load().await, ActivationOutcome::Activated);
        assert!(runtime.realm().apis().is_patched("ua"));
        assert!(module.seen.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn test_configured_reads_installs_and_erases() {
        let runtime = runtime();
        let keys = BridgeKeys::default();
        let id = ModuleId::new("A").unwrap();
        let storage = runtime.realm().storage();
        storage.set(keys.field_key(&id, "flag"), "1");
        storage.set(keys.field_key(&id, "param"), r#"["x","y"]"#);
        broadcast(&runtime, &["A"]);

        let module = TestModule::new("A", Activation::configured(["flag", "param"]));
        let outcome = runtime.loader(module.clone()).load().await;

        assert_eq!(outcome, ActivationOutcome::Activated);
        assert!(storage.is_empty());
        let seen = module.seen.lock().unwrap();
        assert_eq!(seen[0].flag(), Some("1"));
        assert_eq!(seen[0].param_list().unwrap(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_undeclared_fields_are_erased_too() {
        let runtime = runtime();
        let keys = BridgeKeys::default();
        let id = ModuleId::new("A").unwrap();
        let storage = runtime.realm().storage();
        storage.set(keys.field_key(&id, "flag"), "1");
        storage.set(keys.field_key(&id, "stackTrace"), "true");
        storage.set(keys.field_key(&ModuleId::new("B").unwrap(), "flag"), "2");
        storage.set(keys.enabled_key(), r#"["A","B"]"#);
        broadcast(&runtime, &["A"]);

        let module = TestModule::new("A", Activation::configured(["flag"]));
        runtime.loader(module.clone()).load().await;

        assert_eq!(module.seen.lock().unwrap()[0].len(), 1);
        assert_eq!(
            storage.keys(),
            vec!["__patchbay_B_flag".to_owned(), "__patchbay_enabled".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_patch_keeps_captured_value() {
        let runtime = runtime();
        let keys = BridgeKeys::default();
        let id = ModuleId::new("A").unwrap();
        runtime.realm().storage().set(keys.field_key(&id, "flag"), "1");
        broadcast(&runtime, &["A"]);

        let module = TestModule::new("A", Activation::configured(["flag"]));
        runtime.loader(module).load().await;

        runtime.realm().storage().set(keys.field_key(&id, "flag"), "changed");
        assert_eq!(
            runtime.realm().apis().call("A", &Value::Null),
            Some(json!("1"))
        );
    }

    #[tokio::test]
    async fn test_second_load_is_noop() {
        let runtime = runtime();
        broadcast(&runtime, &["A"]);
        let module = TestModule::new("A", Activation::configured(["flag"]));

        let loader = runtime.loader(module.clone());
        assert_eq!(loader.load().await, ActivationOutcome::Activated);
        assert_eq!(loader.load().await, ActivationOutcome::AlreadyActive);

        // A second loader for the same module cannot drain again either.
        broadcast(&runtime, &["A"]);
        assert_eq!(
            runtime.loader(module.clone()).load().await,
            ActivationOutcome::AlreadyActive
        );
        assert_eq!(module.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unlisted_module_never_activates() {
        let runtime = runtime();
        broadcast(&runtime, &["B"]);
        runtime.realm().unload();

        let module = TestModule::new("A", Activation::configured(["flag"]));
        assert_eq!(
            runtime.loader(module.clone()).load().await,
            ActivationOutcome::NotSignalled
        );
        assert!(module.seen.lock().unwrap().is_empty());
        assert!(!runtime.realm().apis().is_patched("A"));
    }

    #[tokio::test]
    async fn test_install_failure_is_contained() {
        let runtime = runtime();
        let outcome = runtime.loader(TestModule::failing("bad")).load().await;
        assert!(matches!(outcome, ActivationOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_discoverable_filters_by_mirror() {
        let runtime = runtime();
        let keys = BridgeKeys::default();
        runtime.realm().storage().set(keys.enabled_key(), r#"["A"]"#);

        let a: Arc<dyn CapabilityModule> = TestModule::new("A", Activation::Immediate);
        let b: Arc<dyn CapabilityModule> = TestModule::new("B", Activation::Immediate);
        let found = runtime.discoverable(&[a, b]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().as_str(), "A");
    }

    #[tokio::test]
    async fn test_activate_all_waits_for_bridge() {
        let runtime = runtime();
        let modules: Vec<Arc<dyn CapabilityModule>> = vec![
            TestModule::new("A", Activation::configured(["flag"])),
            TestModule::new("ua", Activation::Immediate),
        ];

        let task = {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.activate_all(&modules).await })
        };
        broadcast(&runtime, &["A"]);

        let outcomes = task.await.unwrap();
        assert!(outcomes.iter().all(|(_, o)| o.is_activated()));
        assert_eq!(outcomes[0].0.as_str(), "A");
    }
}
