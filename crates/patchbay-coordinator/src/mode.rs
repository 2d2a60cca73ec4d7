//! Mode manager.
//!
//! Two states, [`Mode::Standard`] (per-origin scopes) and [`Mode::Global`]
//! (one scope for every origin). Switching sweeps the old family before
//! registering anything for the new one, so a page never matches an
//! origin registration and a global registration of the same module at
//! once. If part of the old family cannot be removed, the new mode is
//! still persisted but its registrations are deferred until a later
//! [`Coordinator::settle`](crate::Coordinator::settle) clears the residue.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use patchbay_core::{Mode, Scope, ScopeFilter};
use patchbay_events::{EventMetadata, PatchbayEvent};
use patchbay_storage::DesiredStateStore;

use crate::error::CoordinatorResult;
use crate::reconciler::{ReconcileReport, Reconciler, SweepReport};

/// Event source name for mode events.
const EVENT_SOURCE: &str = "mode_manager";

/// What a mode switch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTransition {
    /// Mode before the call.
    pub from: Mode,
    /// Mode after the call.
    pub to: Mode,
    /// Teardown of the old family (empty when unchanged).
    pub swept: SweepReport,
    /// Reconciles of the new family's scopes.
    pub reconciled: Vec<ReconcileReport>,
    /// The new family was not registered because the old one is not fully
    /// swept.
    pub deferred: bool,
}

impl ModeTransition {
    /// Whether the mode actually changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Arbitrates between the two scope families.
#[derive(Debug)]
pub struct ModeManager {
    store: DesiredStateStore,
    reconciler: Arc<Reconciler>,
    transition: Mutex<()>,
}

impl ModeManager {
    /// Manager persisting the mode in `store` and driving `reconciler`.
    #[must_use]
    pub fn new(store: DesiredStateStore, reconciler: Arc<Reconciler>) -> Self {
        Self {
            store,
            reconciler,
            transition: Mutex::new(()),
        }
    }

    /// The persisted mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn current(&self) -> CoordinatorResult<Mode> {
        Ok(self.store.mode().await?)
    }

    /// Switch to `requested`.
    ///
    /// No-op if already there. Otherwise: sweep every registration of the
    /// old family, load (or create empty) the desired state of the new
    /// family and reconcile it, then persist the new mode. The reconcile is
    /// skipped (`deferred`) while anything of the old family is still live.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails. Host failures are reported in
    /// the transition, not as errors.
    pub async fn toggle(&self, requested: Mode) -> CoordinatorResult<ModeTransition> {
        let _guard = self.transition.lock().await;

        let current = self.store.mode().await?;
        if current == requested {
            return Ok(ModeTransition {
                from: current,
                to: requested,
                swept: SweepReport::default(),
                reconciled: Vec::new(),
                deferred: false,
            });
        }

        let swept = self.reconciler.sweep(&ScopeFilter::Family(current)).await;

        let scopes = match requested {
            Mode::Global => {
                self.store.ensure_scope(&Scope::Global).await?;
                vec![Scope::Global]
            },
            Mode::Standard => self.store.scopes_in_family(Mode::Standard).await?,
        };

        let deferred = self.reconciler.has_residue(requested).await;
        let mut reconciled = Vec::with_capacity(scopes.len());
        if deferred {
            warn!(
                from = %current,
                to = %requested,
                failures = swept.failures.len(),
                "Old scope family not fully removed; new registrations deferred"
            );
        } else {
            for scope in scopes {
                let desired = self.store.desired_or_empty(&scope).await?;
                reconciled.push(self.reconciler.reconcile(&scope, &desired).await);
            }
        }

        self.store.set_mode(requested).await?;
        self.store.bus().publish(PatchbayEvent::ModeChanged {
            metadata: EventMetadata::new(EVENT_SOURCE),
            from: current,
            to: requested,
        });

        info!(
            from = %current,
            to = %requested,
            swept = swept.cleared(),
            scopes = reconciled.len(),
            "Mode switched"
        );

        Ok(ModeTransition {
            from: current,
            to: requested,
            swept,
            reconciled,
            deferred,
        })
    }
}
