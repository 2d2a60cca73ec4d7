//! Test fixtures for common types.

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use patchbay_coordinator::{Coordinator, ReconcilerConfig};
use patchbay_core::{ModuleConfig, ModuleId, Origin, Scope};
use patchbay_events::EventBus;
use patchbay_storage::{DesiredStateStore, MemoryKvStore};

use crate::mocks::MockScriptHost;

/// A module id. Panics if `id` is not a valid module id.
#[must_use]
pub fn test_module_id(id: &str) -> ModuleId {
    ModuleId::new(id).unwrap_or_else(|e| panic!("invalid test module id {id:?}: {e}"))
}

/// An origin. Panics if `origin` does not parse.
#[must_use]
pub fn test_origin(origin: &str) -> Origin {
    Origin::parse(origin).unwrap_or_else(|e| panic!("invalid test origin {origin:?}: {e}"))
}

/// The per-origin scope of `origin`.
#[must_use]
pub fn test_scope(origin: &str) -> Scope {
    Scope::Origin(test_origin(origin))
}

/// A capture-style configuration: flag `1`, parameter list `["x", "y"]`.
#[must_use]
pub fn test_config() -> ModuleConfig {
    ModuleConfig::default().with_capture("1", json!(["x", "y"]))
}

/// An in-memory desired-state store on a fresh bus.
#[must_use]
pub fn test_store() -> DesiredStateStore {
    DesiredStateStore::new(Arc::new(MemoryKvStore::new()), EventBus::new())
        .unwrap_or_else(|e| panic!("in-memory store failed to open: {e}"))
}

/// A coordinator over [`test_store`] driving `host`.
#[must_use]
pub fn test_coordinator(host: &MockScriptHost) -> Coordinator {
    Coordinator::new(
        test_store(),
        Arc::new(host.clone()),
        ReconcilerConfig::default(),
    )
}

/// Install a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
