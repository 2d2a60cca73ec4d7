//! Integration tests for the coordinator task and restart behavior.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use patchbay_coordinator::{
    CommandResponse, Coordinator, CoordinatorCommand, CoordinatorError, ReconcilerConfig,
};
use patchbay_core::{InjectionId, Mode, Scope};
use patchbay_events::EventBus;
use patchbay_storage::{DesiredStateStore, FileKvStore};
use patchbay_test::{MockScriptHost, init_test_logging, test_coordinator, test_module_id, test_scope};

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

async fn file_coordinator(path: &std::path::Path, host: &MockScriptHost) -> Coordinator {
    let kv = Arc::new(FileKvStore::open(path).await.unwrap());
    let store = DesiredStateStore::new(kv, EventBus::new()).unwrap();
    Coordinator::new(store, Arc::new(host.clone()), ReconcilerConfig::default())
}

#[tokio::test]
async fn test_task_follows_store_changes() {
    init_test_logging();
    let host = MockScriptHost::new();
    let coordinator = test_coordinator(&host);
    let store = coordinator.store().clone();
    coordinator.start().await.unwrap();
    let (handle, task) = coordinator.spawn();
    let scope = test_scope("example.com");

    store
        .enable_module(&scope, &test_module_id("A"), None)
        .await
        .unwrap();
    eventually("A registered", || host.live_count() == 1).await;

    store.disable_module(&scope, &test_module_id("A")).await.unwrap();
    store
        .enable_module(&scope, &test_module_id("B"), None)
        .await
        .unwrap();
    eventually("A swapped for B", || {
        host.live()
            .iter()
            .map(|s| s.module_id.clone())
            .collect::<Vec<_>>()
            == vec![test_module_id("B")]
    })
    .await;

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_changes_for_inactive_family_wait_for_switch() {
    let host = MockScriptHost::new();
    let coordinator = test_coordinator(&host);
    let store = coordinator.store().clone();
    coordinator.start().await.unwrap();
    let (handle, task) = coordinator.spawn();

    store
        .set_modules(&Scope::Global, vec![test_module_id("G")])
        .await
        .unwrap();
    let status = handle.send(CoordinatorCommand::Status).await.unwrap();
    let CommandResponse::Status { registrations, .. } = status else {
        panic!("unexpected response {status:?}");
    };
    assert!(registrations.is_empty());
    assert_eq!(host.live_count(), 0);

    let response = handle
        .send(CoordinatorCommand::ToggleMode {
            requested_mode: Mode::Global,
        })
        .await
        .unwrap();
    assert_eq!(
        response,
        CommandResponse::ModeChanged {
            from: Mode::Standard,
            to: Mode::Global,
            swept: 0,
            registered: 1,
            deferred: false,
        }
    );
    assert_eq!(host.live_matching("<all_urls>").len(), 1);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_reconcile_command_outside_mode_is_rejected() {
    let host = MockScriptHost::new();
    let coordinator = test_coordinator(&host);
    let (handle, task) = coordinator.spawn();

    let response = handle
        .send(CoordinatorCommand::Reconcile {
            scope: String::new(),
            is_global: true,
            module_ids: vec![test_module_id("A")],
        })
        .await
        .unwrap();

    assert!(matches!(response, CommandResponse::Rejected { .. }));
    assert!(host.calls().is_empty());

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_concurrent_reconcile_commands_converge() {
    let host = MockScriptHost::new();
    let coordinator = test_coordinator(&host);
    let (handle, task) = coordinator.spawn();

    let sends = (0..5).map(|i| {
        let handle = handle.clone();
        async move {
            let modules = if i % 2 == 0 {
                vec![test_module_id("A"), test_module_id("B")]
            } else {
                vec![test_module_id("B"), test_module_id("C")]
            };
            handle
                .send(CoordinatorCommand::Reconcile {
                    scope: "example.com".to_owned(),
                    is_global: false,
                    module_ids: modules,
                })
                .await
        }
    });
    let responses = join_all(sends).await;
    assert!(responses.iter().all(Result::is_ok));

    let status = handle.send(CoordinatorCommand::Status).await.unwrap();
    let CommandResponse::Status { registrations, .. } = status else {
        panic!("unexpected response {status:?}");
    };
    assert_eq!(registrations.len(), 2);
    assert_eq!(host.live_count(), 2);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_handle_reports_stopped_after_shutdown() {
    let host = MockScriptHost::new();
    let (handle, task) = test_coordinator(&host).spawn();

    handle.shutdown();
    task.await.unwrap();

    let err = handle.send(CoordinatorCommand::Status).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Stopped));
}

#[tokio::test]
async fn test_restart_sweeps_survivors_then_restores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let first_host = MockScriptHost::new();
    let first = file_coordinator(&path, &first_host).await;
    first
        .store()
        .set_modules(&test_scope("example.com"), vec![test_module_id("A")])
        .await
        .unwrap();
    first.start().await.unwrap();
    let old_id = first_host.live()[0].id.clone();
    drop(first);

    let host = MockScriptHost::new()
        .with_survivor(old_id.as_str(), test_module_id("A"))
        .with_survivor("patchbay-orphan", test_module_id("Z"))
        .with_survivor("other-extension-1", test_module_id("X"));
    let restarted = file_coordinator(&path, &host).await;

    let report = restarted.start().await.unwrap();

    assert_eq!(report.mode, Mode::Standard);
    assert_eq!(report.swept.removed.len(), 2);
    assert!(!host.is_live(&old_id));
    assert!(!host.is_live(&InjectionId::from_raw("patchbay-orphan")));
    assert!(host.is_live(&InjectionId::from_raw("other-extension-1")));

    assert_eq!(report.restored.len(), 1);
    let restored = &report.restored[0].registered;
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].module_id(), &test_module_id("A"));
    assert_ne!(restored[0].injection_id, old_id);
    assert_eq!(host.live_count(), 2);
}

#[tokio::test]
async fn test_restart_in_global_mode_restores_global_scope_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let first = file_coordinator(&path, &MockScriptHost::new()).await;
    first
        .store()
        .set_modules(&test_scope("example.com"), vec![test_module_id("A")])
        .await
        .unwrap();
    first
        .store()
        .set_modules(&Scope::Global, vec![test_module_id("G")])
        .await
        .unwrap();
    first.modes().toggle(Mode::Global).await.unwrap();
    drop(first);

    let host = MockScriptHost::new();
    let report = file_coordinator(&path, &host).await.start().await.unwrap();

    assert_eq!(report.mode, Mode::Global);
    assert_eq!(host.registered_modules(), vec![test_module_id("G")]);
    assert_eq!(host.live_matching("<all_urls>").len(), 1);
}
