//! In-crate host fake for unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use patchbay_core::{InjectionId, ModuleId};

use crate::error::{HostError, HostResult};
use crate::host::{ScriptHost, ScriptRegistration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Register(ModuleId),
    Unregister(InjectionId),
}

#[derive(Default)]
pub(crate) struct FakeHost {
    pub(crate) live: Mutex<BTreeMap<InjectionId, ScriptRegistration>>,
    pub(crate) calls: Mutex<Vec<Call>>,
    pub(crate) reject_modules: Mutex<BTreeSet<ModuleId>>,
    pub(crate) stuck_ids: Mutex<BTreeSet<InjectionId>>,
}

impl FakeHost {
    pub(crate) fn seed(&self, raw_id: &str) {
        let id = InjectionId::from_raw(raw_id);
        self.live.lock().unwrap().insert(
            id.clone(),
            ScriptRegistration {
                id,
                module_id: ModuleId::new("survivor").unwrap(),
                matches: vec!["<all_urls>".to_owned()],
                run_at: crate::host::RunAt::DocumentStart,
                world: crate::host::ExecutionWorld::Main,
                all_frames: false,
            },
        );
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl ScriptHost for FakeHost {
    async fn register(&self, script: ScriptRegistration) -> HostResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Register(script.module_id.clone()));
        if self.reject_modules.lock().unwrap().contains(&script.module_id) {
            return Err(HostError::Rejected(script.module_id.to_string()));
        }
        self.live.lock().unwrap().insert(script.id.clone(), script);
        Ok(())
    }

    async fn unregister(&self, id: &InjectionId) -> HostResult<()> {
        self.calls.lock().unwrap().push(Call::Unregister(id.clone()));
        if self.stuck_ids.lock().unwrap().contains(id) {
            return Err(HostError::Unavailable(id.to_string()));
        }
        match self.live.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(HostError::NotFound(id.to_string())),
        }
    }

    async fn registered_ids(&self) -> HostResult<Vec<InjectionId>> {
        Ok(self.live.lock().unwrap().keys().cloned().collect())
    }
}
