//! Registration reconciler.
//!
//! Owns the live registry (what is injected, where, under which id) and
//! converges it to a desired module set one scope at a time:
//!
//! 1. unregister every live entry of the scope that is no longer desired
//! 2. register every desired module without a live entry
//! 3. leave desired modules that are already live untouched, so their
//!    injection id stays stable
//!
//! The reconciler is eventually consistent, not transactional. A failed
//! host call is logged and recorded in the report. The registry keeps an
//! entry whose unregister failed, so the next reconcile retries it.
//! Unregistering an id the host no longer knows is treated as success.
//!
//! Namespaced ids the startup sweep could not remove are kept as orphans
//! and retried by every later sweep. Until they are gone, and until the
//! inactive scope family is fully swept, [`Reconciler::has_residue`]
//! reports residue and callers must not register the active family.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use patchbay_core::{InjectionId, Mode, ModuleId, Registration, Scope, ScopeFilter, ScopeKey};
use patchbay_events::{EventBus, EventMetadata, PatchbayEvent};

use crate::error::HostError;
use crate::host::{ScriptHost, ScriptRegistration};

/// Event source name for registration events.
const EVENT_SOURCE: &str = "reconciler";

/// Default namespace prefix of injection ids.
pub const DEFAULT_ID_PREFIX: &str = "patchbay";

/// Reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Namespace prefix of every injection id this coordinator creates.
    pub id_prefix: String,
    /// Inject into subframes as well.
    pub all_frames: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_ID_PREFIX.to_owned(),
            all_frames: false,
        }
    }
}

/// A host call that failed during a reconcile or sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    /// Module involved, if known.
    pub module_id: Option<ModuleId>,
    /// Injection id involved.
    pub injection_id: InjectionId,
    /// The host error.
    pub error: HostError,
}

/// What one reconcile did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The reconciled scope.
    pub scope: Scope,
    /// Registrations created.
    pub registered: Vec<Registration>,
    /// Ids removed from the registry (including ones the host had already
    /// dropped).
    pub unregistered: Vec<InjectionId>,
    /// Desired modules that were already live.
    pub unchanged: usize,
    /// Host calls that failed.
    pub failures: Vec<HostFailure>,
}

impl ReconcileReport {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            registered: Vec::new(),
            unregistered: Vec::new(),
            unchanged: 0,
            failures: Vec::new(),
        }
    }

    /// Whether the registry changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.registered.is_empty() || !self.unregistered.is_empty()
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ids the host unregistered.
    pub removed: Vec<InjectionId>,
    /// Ids the host had already dropped.
    pub already_gone: Vec<InjectionId>,
    /// Host calls that failed.
    pub failures: Vec<HostFailure>,
}

impl SweepReport {
    /// Record one removal. Returns `true` if the registration is gone.
    fn record(&mut self, removal: Removal, module_id: Option<ModuleId>, id: &InjectionId) -> bool {
        match removal {
            Removal::Removed => self.removed.push(id.clone()),
            Removal::AlreadyGone => self.already_gone.push(id.clone()),
            Removal::Failed(error) => {
                self.failures.push(HostFailure {
                    module_id,
                    injection_id: id.clone(),
                    error,
                });
                return false;
            },
        }
        true
    }

    /// Number of registrations no longer live.
    #[must_use]
    pub fn cleared(&self) -> usize {
        self.removed.len().saturating_add(self.already_gone.len())
    }
}

enum Removal {
    Removed,
    AlreadyGone,
    Failed(HostError),
}

#[derive(Debug, Default)]
struct Registry {
    live: BTreeMap<ScopeKey, Registration>,
    /// Namespaced host ids of unknown scope whose unregister failed.
    orphans: BTreeSet<InjectionId>,
}

/// The single choke point for host registration changes.
pub struct Reconciler {
    host: Arc<dyn ScriptHost>,
    bus: EventBus,
    config: ReconcilerConfig,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler driving `host` and announcing changes on `bus`.
    #[must_use]
    pub fn new(host: Arc<dyn ScriptHost>, bus: EventBus, config: ReconcilerConfig) -> Self {
        Self {
            host,
            bus,
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Reconciler settings.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Converge the live registrations of `scope` to `desired`.
    ///
    /// Idempotent. The match rule follows the scope: a single origin for
    /// origin scopes, every page for the global scope.
    pub async fn reconcile(&self, scope: &Scope, desired: &[ModuleId]) -> ReconcileReport {
        let mut guard = self.registry.lock().await;
        let registry = &mut guard.live;
        let mut report = ReconcileReport::new(scope.clone());

        let stale: Vec<Registration> = registry
            .iter()
            .filter(|(key, _)| key.belongs_to(scope) && !desired.contains(key.module_id()))
            .map(|(_, reg)| reg.clone())
            .collect();

        for reg in stale {
            match self.remove(&reg.injection_id).await {
                Removal::Removed | Removal::AlreadyGone => {
                    registry.remove(&reg.scope_key);
                    self.announce_removed(Some(reg.scope_key), &reg.injection_id);
                    report.unregistered.push(reg.injection_id);
                },
                Removal::Failed(error) => report.failures.push(HostFailure {
                    module_id: Some(reg.module_id().clone()),
                    injection_id: reg.injection_id,
                    error,
                }),
            }
        }

        for id in desired {
            let key = ScopeKey::new(scope, id.clone());
            if registry.contains_key(&key) {
                report.unchanged = report.unchanged.saturating_add(1);
                continue;
            }

            let reg = Registration::new(key, &self.config.id_prefix);
            let request = ScriptRegistration::for_registration(&reg, self.config.all_frames);
            match self.host.register(request).await {
                Ok(()) => {
                    info!(
                        scope_key = %reg.scope_key,
                        injection_id = %reg.injection_id,
                        pattern = %reg.match_pattern,
                        "Registered module"
                    );
                    self.bus.publish(PatchbayEvent::RegistrationCreated {
                        metadata: EventMetadata::new(EVENT_SOURCE),
                        scope_key: reg.scope_key.clone(),
                        injection_id: reg.injection_id.clone(),
                    });
                    registry.insert(reg.scope_key.clone(), reg.clone());
                    report.registered.push(reg);
                },
                Err(error) => {
                    warn!(
                        scope_key = %reg.scope_key,
                        injection_id = %reg.injection_id,
                        error = %error,
                        "Failed to register module"
                    );
                    report.failures.push(HostFailure {
                        module_id: Some(id.clone()),
                        injection_id: reg.injection_id,
                        error,
                    });
                },
            }
        }

        debug!(
            scope = %scope,
            registered = report.registered.len(),
            unregistered = report.unregistered.len(),
            unchanged = report.unchanged,
            failures = report.failures.len(),
            "Reconciled scope"
        );
        report
    }

    /// Unregister every live registration selected by `filter`, then retry
    /// any startup orphans.
    pub async fn sweep(&self, filter: &ScopeFilter) -> SweepReport {
        let mut registry = self.registry.lock().await;
        let mut report = SweepReport::default();

        let selected: Vec<Registration> = registry
            .live
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(_, reg)| reg.clone())
            .collect();

        for reg in selected {
            let removal = self.remove(&reg.injection_id).await;
            let module_id = reg.module_id().clone();
            if report.record(removal, Some(module_id), &reg.injection_id) {
                registry.live.remove(&reg.scope_key);
                self.announce_removed(Some(reg.scope_key), &reg.injection_id);
            }
        }

        let orphans: Vec<InjectionId> = registry.orphans.iter().cloned().collect();
        for id in orphans {
            let removal = self.remove(&id).await;
            if report.record(removal, None, &id) {
                registry.orphans.remove(&id);
                self.announce_removed(None, &id);
            }
        }

        info!(filter = ?filter, cleared = report.cleared(), "Swept registrations");
        report
    }

    /// Unregister every host registration carrying this coordinator's id
    /// namespace, including survivors of a previous run, and clear the
    /// registry.
    ///
    /// Ids that fail to unregister are kept as orphans for later sweeps.
    pub async fn startup_sweep(&self) -> SweepReport {
        let mut registry = self.registry.lock().await;
        let mut report = SweepReport::default();

        let ids = match self.host.registered_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not list host registrations for startup sweep");
                return report;
            },
        };

        registry.live.clear();
        registry.orphans.clear();
        for id in ids
            .into_iter()
            .filter(|id| id.has_namespace(&self.config.id_prefix))
        {
            let removal = self.remove(&id).await;
            if report.record(removal, None, &id) {
                self.announce_removed(None, &id);
            } else {
                registry.orphans.insert(id);
            }
        }

        info!(
            removed = report.removed.len(),
            already_gone = report.already_gone.len(),
            failures = report.failures.len(),
            "Startup sweep complete"
        );
        report
    }

    /// Whether anything that must not be live while `mode` is active still
    /// is: registrations of the other scope family, or startup orphans.
    pub async fn has_residue(&self, mode: Mode) -> bool {
        let registry = self.registry.lock().await;
        let inactive = ScopeFilter::Family(mode.other());
        !registry.orphans.is_empty() || registry.live.keys().any(|key| inactive.matches(key))
    }

    /// Startup orphans still awaiting removal.
    pub async fn orphans(&self) -> Vec<InjectionId> {
        self.registry.lock().await.orphans.iter().cloned().collect()
    }

    /// Live registrations selected by `filter`, ordered by key.
    pub async fn live_registrations(&self, filter: &ScopeFilter) -> Vec<Registration> {
        self.registry
            .lock()
            .await
            .live
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(_, reg)| reg.clone())
            .collect()
    }

    /// Modules live in `scope`.
    pub async fn live_modules(&self, scope: &Scope) -> Vec<ModuleId> {
        self.live_registrations(&ScopeFilter::Scope(scope.clone()))
            .await
            .into_iter()
            .map(|reg| reg.module_id().clone())
            .collect()
    }

    /// A scope with live registrations that overlaps `scope`, if any.
    pub async fn overlapping_live(&self, scope: &Scope) -> Option<Scope> {
        self.registry
            .lock()
            .await
            .live
            .keys()
            .map(ScopeKey::scope)
            .find(|other| scope.overlaps(other))
    }

    async fn remove(&self, id: &InjectionId) -> Removal {
        match self.host.unregister(id).await {
            Ok(()) => {
                info!(injection_id = %id, "Unregistered module");
                Removal::Removed
            },
            Err(e) if e.is_already_gone() => {
                debug!(injection_id = %id, "Registration already gone");
                Removal::AlreadyGone
            },
            Err(e) => {
                warn!(injection_id = %id, error = %e, "Failed to unregister module");
                Removal::Failed(e)
            },
        }
    }

    fn announce_removed(&self, scope_key: Option<ScopeKey>, id: &InjectionId) {
        self.bus.publish(PatchbayEvent::RegistrationRemoved {
            metadata: EventMetadata::new(EVENT_SOURCE),
            scope_key,
            injection_id: id.clone(),
        });
    }
}
