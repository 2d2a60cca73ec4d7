//! The coordinator: startup sweep, command handling, and the event loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use patchbay_core::{DesiredStateChange, Mode, Scope, ScopeFilter};
use patchbay_events::{EventKind, EventReceiver, PatchbayEvent};
use patchbay_storage::DesiredStateStore;

use crate::command::{CommandResponse, CoordinatorCommand};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::host::ScriptHost;
use crate::mode::ModeManager;
use crate::reconciler::{ReconcileReport, Reconciler, ReconcilerConfig, SweepReport};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// How often the running task retries removing residue.
const SETTLE_INTERVAL: Duration = Duration::from_secs(30);

/// What [`Coordinator::start`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// The stale-registration sweep.
    pub swept: SweepReport,
    /// The restored mode.
    pub mode: Mode,
    /// Reconciles of the restored mode's scopes.
    pub restored: Vec<ReconcileReport>,
    /// Restore was skipped because stale registrations could not be removed.
    pub deferred: bool,
}

/// Ties the store, the reconciler and the mode manager together.
#[derive(Debug, Clone)]
pub struct Coordinator {
    store: DesiredStateStore,
    reconciler: Arc<Reconciler>,
    modes: Arc<ModeManager>,
}

impl Coordinator {
    /// Coordinator over `store` driving `host`.
    #[must_use]
    pub fn new(store: DesiredStateStore, host: Arc<dyn ScriptHost>, config: ReconcilerConfig) -> Self {
        let reconciler = Arc::new(Reconciler::new(host, store.bus().clone(), config));
        let modes = Arc::new(ModeManager::new(store.clone(), Arc::clone(&reconciler)));
        Self {
            store,
            reconciler,
            modes,
        }
    }

    /// The desired-state store.
    #[must_use]
    pub fn store(&self) -> &DesiredStateStore {
        &self.store
    }

    /// The reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// The mode manager.
    #[must_use]
    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    /// Sweep survivors of a previous run, then restore the persisted mode
    /// by reconciling every stored scope of its family.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn start(&self) -> CoordinatorResult<StartupReport> {
        let swept = self.reconciler.startup_sweep().await;
        let mode = self.store.mode().await?;

        let deferred = self.reconciler.has_residue(mode).await;
        let restored = if deferred {
            warn!(
                failures = swept.failures.len(),
                "Stale registrations survived the startup sweep; restore deferred"
            );
            Vec::new()
        } else {
            self.restore(mode).await?
        };

        info!(
            mode = %mode,
            swept = swept.cleared(),
            scopes = restored.len(),
            "Coordinator started"
        );
        Ok(StartupReport {
            swept,
            mode,
            restored,
            deferred,
        })
    }

    /// Clear residue left by a failed sweep, then catch up.
    ///
    /// Residue is any registration of the inactive scope family and any
    /// startup orphan. While it exists nothing of the active family is
    /// registered. Once it is gone every scope of the active family is
    /// reconciled, applying whatever was deferred meanwhile.
    ///
    /// Returns `false` if residue remains.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn settle(&self) -> CoordinatorResult<bool> {
        let mode = self.store.mode().await?;
        if !self.reconciler.has_residue(mode).await {
            return Ok(true);
        }

        let swept = self
            .reconciler
            .sweep(&ScopeFilter::Family(mode.other()))
            .await;
        if self.reconciler.has_residue(mode).await {
            warn!(
                mode = %mode,
                failures = swept.failures.len(),
                "Residue still live; active scope family stays deferred"
            );
            return Ok(false);
        }

        let restored = self.restore(mode).await?;
        info!(mode = %mode, scopes = restored.len(), "Residue cleared; active family restored");
        Ok(true)
    }

    async fn restore(&self, mode: Mode) -> CoordinatorResult<Vec<ReconcileReport>> {
        let mut restored = Vec::new();
        for scope in self.store.scopes_in_family(mode).await? {
            let desired = self.store.desired_or_empty(&scope).await?;
            restored.push(self.reconciler.reconcile(&scope, &desired).await);
        }
        Ok(restored)
    }

    /// Handle one UI command.
    ///
    /// A reconcile for a scope outside the active mode's family is
    /// rejected, so the two families never coexist live. So is any
    /// reconcile while [`Coordinator::settle`] cannot clear residue, and a
    /// non-empty reconcile of a scope overlapping a live one.
    ///
    /// # Errors
    ///
    /// Returns an error if the command carries an invalid scope or the store
    /// fails.
    pub async fn handle(&self, command: CoordinatorCommand) -> CoordinatorResult<CommandResponse> {
        match command {
            CoordinatorCommand::ToggleMode { requested_mode } => {
                let transition = self.modes.toggle(requested_mode).await?;
                if !transition.changed() {
                    self.settle().await?;
                    return Ok(CommandResponse::ModeUnchanged {
                        mode: transition.to,
                    });
                }
                let registered = transition
                    .reconciled
                    .iter()
                    .map(|r| r.registered.len())
                    .fold(0_usize, usize::saturating_add);
                Ok(CommandResponse::ModeChanged {
                    from: transition.from,
                    to: transition.to,
                    swept: transition.swept.cleared(),
                    registered,
                    deferred: transition.deferred,
                })
            },
            CoordinatorCommand::Reconcile {
                scope,
                is_global,
                module_ids,
            } => {
                let scope = Scope::from_parts(&scope, is_global)?;
                let mode = self.store.mode().await?;
                if scope.family() != mode {
                    debug!(scope = %scope, mode = %mode, "Rejecting reconcile outside active mode");
                    return Ok(CommandResponse::Rejected {
                        reason: format!("scope {scope} is not active in {mode} mode"),
                    });
                }
                if !self.settle().await? {
                    return Ok(CommandResponse::Rejected {
                        reason: "registrations of the inactive scope family are still live"
                            .to_owned(),
                    });
                }
                if !module_ids.is_empty()
                    && let Some(other) = self.reconciler.overlapping_live(&scope).await
                {
                    debug!(scope = %scope, existing = %other, "Rejecting overlapping reconcile");
                    return Ok(CommandResponse::Rejected {
                        reason: format!("scope {scope} overlaps live scope {other}"),
                    });
                }
                let report = self.reconciler.reconcile(&scope, &module_ids).await;
                Ok(CommandResponse::Reconciled {
                    registered: report
                        .registered
                        .into_iter()
                        .map(|r| r.injection_id)
                        .collect(),
                    unregistered: report.unregistered,
                    unchanged: report.unchanged,
                    failed: report.failures.len(),
                })
            },
            CoordinatorCommand::Status => Ok(CommandResponse::Status {
                mode: self.store.mode().await?,
                registrations: self.reconciler.live_registrations(&ScopeFilter::All).await,
            }),
        }
    }

    /// Apply a desired-state change notification.
    ///
    /// Returns `None` when the scope is not active in the current mode (its
    /// desired set is kept and applied on the next switch into that mode) or
    /// while residue blocks the active family (applied by the next
    /// successful [`Coordinator::settle`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn apply_change(
        &self,
        change: &DesiredStateChange,
    ) -> CoordinatorResult<Option<ReconcileReport>> {
        let mode = self.store.mode().await?;
        if change.scope_key.family() != mode {
            debug!(scope = %change.scope_key, mode = %mode, "Change outside active mode; deferred");
            return Ok(None);
        }
        if !self.settle().await? {
            debug!(scope = %change.scope_key, "Residue still live; change deferred");
            return Ok(None);
        }
        Ok(Some(
            self.reconciler
                .reconcile(&change.scope_key, change.desired())
                .await,
        ))
    }

    /// Run the coordinator as a task.
    ///
    /// The task consumes desired-state changes from the bus and commands
    /// from the returned handle, and periodically retries
    /// [`Coordinator::settle`]. It stops when [`CoordinatorHandle::shutdown`]
    /// is called or every handle is dropped.
    #[must_use]
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let events = self
            .store
            .bus()
            .subscribe_kinds(&[EventKind::DesiredStateChanged]);
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(rx, events, shutdown_rx));
        let handle = CoordinatorHandle {
            tx,
            shutdown: Arc::new(shutdown_tx),
        };
        (handle, task)
    }

    async fn run(
        self,
        mut commands: mpsc::Receiver<Request>,
        mut events: EventReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Coordinator loop running");
        let mut settle_tick = tokio::time::interval(SETTLE_INTERVAL);
        settle_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Coordinator received shutdown signal");
                    break;
                }

                Some(event) = events.recv() => {
                    if let PatchbayEvent::DesiredStateChanged { change, .. } = &*event
                        && let Err(e) = self.apply_change(change).await
                    {
                        warn!(scope = %change.scope_key, error = %e, "Failed to apply desired-state change");
                    }
                }

                request = commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        debug!("All coordinator handles dropped");
                        break;
                    };
                    let response = self.handle(command).await;
                    if reply.send(response).is_err() {
                        debug!("Command caller went away before the reply");
                    }
                }

                _ = settle_tick.tick() => {
                    if let Err(e) = self.settle().await {
                        warn!(error = %e, "Failed to settle residue");
                    }
                }
            }
        }
    }
}

struct Request {
    command: CoordinatorCommand,
    reply: oneshot::Sender<CoordinatorResult<CommandResponse>>,
}

/// Sends commands to a running coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Request>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl CoordinatorHandle {
    /// Send `command` and wait for the response.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Stopped`] if the task is gone, or the
    /// error the coordinator produced for the command.
    pub async fn send(&self, command: CoordinatorCommand) -> CoordinatorResult<CommandResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)?
    }

    /// Ask the task to stop after its current message.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
