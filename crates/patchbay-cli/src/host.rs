//! Script host backed by the state file.
//!
//! A browser keeps dynamic script registrations across extension restarts.
//! The CLI models that by persisting them next to the desired state, so the
//! startup sweep has real survivors to clear on every run.

use async_trait::async_trait;
use tracing::info;

use patchbay_coordinator::{HostError, HostResult, ScriptHost, ScriptRegistration};
use patchbay_core::InjectionId;
use patchbay_storage::{ScopedKvStore, StorageError};

/// Namespace holding persisted registrations.
pub(crate) const HOST_NAMESPACE: &str = "host_scripts";

/// [`ScriptHost`] that keeps registrations in a [`ScopedKvStore`].
#[derive(Debug, Clone)]
pub(crate) struct StoredScriptHost {
    scripts: ScopedKvStore,
}

impl StoredScriptHost {
    pub(crate) fn new(scripts: ScopedKvStore) -> Self {
        Self { scripts }
    }

    /// Every persisted registration.
    pub(crate) async fn registrations(&self) -> HostResult<Vec<ScriptRegistration>> {
        let mut out = Vec::new();
        for key in self.scripts.list_keys().await.map_err(unavailable)? {
            if let Some(script) = self
                .scripts
                .get_json::<ScriptRegistration>(&key)
                .await
                .map_err(unavailable)?
            {
                out.push(script);
            }
        }
        Ok(out)
    }
}

fn unavailable(e: StorageError) -> HostError {
    HostError::Unavailable(e.to_string())
}

#[async_trait]
impl ScriptHost for StoredScriptHost {
    async fn register(&self, script: ScriptRegistration) -> HostResult<()> {
        let key = script.id.as_str().to_owned();
        if self
            .scripts
            .get_json::<ScriptRegistration>(&key)
            .await
            .map_err(unavailable)?
            .is_some()
        {
            return Err(HostError::Rejected(format!("duplicate script id {key}")));
        }
        self.scripts.set_json(&key, &script).await.map_err(unavailable)?;
        info!(
            injection_id = %script.id,
            matches = ?script.matches,
            "host: content script registered"
        );
        Ok(())
    }

    async fn unregister(&self, id: &InjectionId) -> HostResult<()> {
        if self.scripts.delete(id.as_str()).await.map_err(unavailable)? {
            info!(injection_id = %id, "host: content script unregistered");
            Ok(())
        } else {
            Err(HostError::NotFound(id.to_string()))
        }
    }

    async fn registered_ids(&self) -> HostResult<Vec<InjectionId>> {
        Ok(self
            .scripts
            .list_keys()
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(InjectionId::from_raw)
            .collect())
    }
}
