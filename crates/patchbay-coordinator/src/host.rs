//! The host's script-injection control surface.
//!
//! Only the [`Reconciler`](crate::Reconciler) calls a [`ScriptHost`]. Every
//! registration change goes through it so the live registry and the host
//! never diverge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use patchbay_core::{InjectionId, ModuleId, Registration};

use crate::error::HostResult;

/// When during page load an injected module runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    /// Before any page script.
    #[default]
    DocumentStart,
    /// After the DOM is parsed.
    DocumentEnd,
    /// When the page is idle.
    DocumentIdle,
}

/// Which realm an injected module runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionWorld {
    /// The page's own realm.
    #[default]
    Main,
    /// An isolated realm that shares only the DOM.
    Isolated,
}

/// A registration request as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRegistration {
    /// Host-side id.
    pub id: InjectionId,
    /// Module to inject.
    pub module_id: ModuleId,
    /// Match patterns in host syntax.
    pub matches: Vec<String>,
    /// Injection point.
    pub run_at: RunAt,
    /// Target realm.
    pub world: ExecutionWorld,
    /// Also inject into subframes.
    pub all_frames: bool,
}

impl ScriptRegistration {
    /// Request for `registration`: earliest injection point, page realm.
    #[must_use]
    pub fn for_registration(registration: &Registration, all_frames: bool) -> Self {
        Self {
            id: registration.injection_id.clone(),
            module_id: registration.module_id().clone(),
            matches: vec![registration.match_pattern.as_host_pattern().to_owned()],
            run_at: RunAt::DocumentStart,
            world: ExecutionWorld::Main,
            all_frames,
        }
    }
}

/// Script-injection control surface of the host.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Register a module for injection.
    async fn register(&self, script: ScriptRegistration) -> HostResult<()>;

    /// Unregister by id. Returns [`HostError::NotFound`](crate::HostError::NotFound)
    /// if the host has no such registration.
    async fn unregister(&self, id: &InjectionId) -> HostResult<()>;

    /// Every id the host currently has registered, including ones from
    /// previous runs.
    async fn registered_ids(&self) -> HostResult<Vec<InjectionId>>;
}
