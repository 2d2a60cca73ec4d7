//! Wiring from [`patchbay_config::Config`] to the running pieces.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use patchbay_bridge::ConfigBridge;
use patchbay_config::Config;
use patchbay_coordinator::{Coordinator, ReconcilerConfig};
use patchbay_events::EventBus;
use patchbay_page::BridgeKeys;
use patchbay_storage::{DesiredStateStore, FileKvStore, KvStore, ScopedKvStore};
use patchbay_telemetry::{LogConfig, LogFormat};

use crate::host::{HOST_NAMESPACE, StoredScriptHost};

/// Logging settings from the `[logging]` section, `--verbose` forcing debug.
pub(crate) fn log_config(config: &Config, verbose: bool) -> LogConfig {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let format = config
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();
    config
        .logging
        .directives
        .iter()
        .fold(LogConfig::new(level).with_format(format), |lc, d| {
            lc.with_directive(d.clone())
        })
}

/// Everything one CLI invocation works with.
pub(crate) struct App {
    pub(crate) state_path: PathBuf,
    pub(crate) store: DesiredStateStore,
    pub(crate) host: StoredScriptHost,
    pub(crate) coordinator: Coordinator,
    pub(crate) bridge: ConfigBridge,
}

impl App {
    /// Open the state file and build the coordinator and bridge.
    pub(crate) async fn open(config: &Config, state_override: Option<PathBuf>) -> Result<Self> {
        let state_path = match state_override {
            Some(path) => path,
            None => config.store.resolve_path()?,
        };
        let kv: Arc<dyn KvStore> = Arc::new(
            FileKvStore::open(&state_path)
                .await
                .with_context(|| format!("opening state file {}", state_path.display()))?,
        );
        debug!(path = %state_path.display(), "State file opened");

        let store = DesiredStateStore::new(Arc::clone(&kv), EventBus::new())?;
        let host = StoredScriptHost::new(ScopedKvStore::new(kv, HOST_NAMESPACE)?);
        let coordinator = Coordinator::new(
            store.clone(),
            Arc::new(host.clone()),
            ReconcilerConfig {
                id_prefix: config.registry.id_prefix.clone(),
                all_frames: config.registry.all_frames,
            },
        );
        let bridge = ConfigBridge::new(
            store.clone(),
            BridgeKeys::new(&config.bridge.prefix, &config.bridge.enabled_list_key),
        );

        Ok(Self {
            state_path,
            store,
            host,
            coordinator,
            bridge,
        })
    }
}
