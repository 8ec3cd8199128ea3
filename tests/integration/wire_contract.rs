//! A local driver running against a server-side handler through the step protocol.

use std::sync::Arc;

use async_trait::async_trait;
use bulkgen::cursor::{CursorStore, DriverPhase, FinalStatus, MemoryCursorStore, ProgressCursor};
use bulkgen::generation::{
    CancelFlag, CompletionHandler, GenerationDriver, LocalExecutor, MemoryHookLedger,
    TransportError,
};
use bulkgen::items::ItemStore;
use bulkgen::job::{GenerationSettings, JobCatalog};
use bulkgen::storage::RunStores;
use bulkgen::types::JobKind;
use bulkgen::wire::{
    RemoteLifecycle, StepAction, StepRequest, StepResponse, StepTransport, WireExecutor,
    WireHandler,
};

use crate::integration::test_utils::{catalog, definition, job_config, CountingObserver};

/// Hands requests straight to a handler, encoded the way HTTP would carry them.
struct LoopbackTransport {
    handler: WireHandler,
}

#[async_trait]
impl StepTransport for LoopbackTransport {
    async fn send(&self, request: &StepRequest) -> Result<String, TransportError> {
        let raw = serde_json::to_string(request).map_err(|e| TransportError::new(e.to_string()))?;
        Ok(self.handler.handle_json(&raw).await)
    }
}

fn server(catalog: Arc<JobCatalog>, stores: &RunStores) -> WireHandler {
    let driver = GenerationDriver::new(
        Arc::new(LocalExecutor::new(catalog.clone(), stores.items.clone())),
        stores.cursors.clone(),
        stores.locks.clone(),
        CompletionHandler::new(stores.ledger.clone()),
        stores.results.clone(),
    );
    WireHandler::new(
        driver,
        catalog,
        GenerationSettings {
            retry_pause_ms: 0,
            ..GenerationSettings::default()
        },
    )
}

#[tokio::test]
async fn test_remote_run_generates_on_server() {
    let catalog = catalog(vec![definition("cities", JobKind::Content, 5)]);
    let server_stores = RunStores::temporary(3600).unwrap();
    let transport: Arc<dyn StepTransport> = Arc::new(LoopbackTransport {
        handler: server(catalog, &server_stores),
    });

    let client_stores = RunStores::temporary(3600).unwrap();
    let cancel = CancelFlag::new();
    let observer = Arc::new(CountingObserver::default());
    let config = job_config("cities", 5, 2, true);
    let driver = GenerationDriver::new(
        Arc::new(WireExecutor::new(transport.clone(), &config).with_cancel_flag(cancel.clone())),
        Arc::new(MemoryCursorStore::new()),
        client_stores.locks.clone(),
        CompletionHandler::new(Arc::new(MemoryHookLedger::new()))
            .with_observer(Arc::new(RemoteLifecycle::new(transport)))
            .with_observer(observer.clone()),
        client_stores.results.clone(),
    )
    .with_cancel_flag(cancel);

    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-remote", 0, 5))
        .await
        .unwrap();

    assert_eq!(summary.status, FinalStatus::Completed);
    assert_eq!(summary.processed_count, 5);
    assert_eq!(observer.finishes(), 1);

    let items = server_stores.items.list_for_job("cities").unwrap();
    assert_eq!(items.len(), 5);
    let server_cursor = server_stores.cursors.load("cities").unwrap().unwrap();
    assert_eq!(server_cursor.nonce, "run-remote");
    assert_eq!(server_cursor.phase, DriverPhase::Done);
    assert_eq!(server_cursor.final_status, Some(FinalStatus::Completed));
}

#[tokio::test]
async fn test_server_rejects_offset_mismatch_and_unknown_nonce() {
    let catalog = catalog(vec![definition("cities", JobKind::Content, 4)]);
    let stores = RunStores::temporary(3600).unwrap();
    let handler = server(catalog, &stores);

    let start = StepRequest {
        step_size: 2,
        target_count: 4,
        stop_on_error: true,
        ..StepRequest::new(StepAction::Start, "cities", "run-a")
    };
    assert!(handler.handle(&start).await.success);

    let mut skipped = start.clone();
    skipped.action = StepAction::Step;
    skipped.current_offset = 2;
    skipped.resume_offset = 2;
    let response: StepResponse = handler.handle(&skipped).await;
    assert!(!response.success);
    assert!(response.messages()[0].contains("Offset mismatch"));

    let stranger = StepRequest::new(StepAction::Step, "cities", "run-b");
    assert!(!handler.handle(&stranger).await.success);
    assert!(stores.items.list_for_job("cities").unwrap().is_empty());
}

#[tokio::test]
async fn test_server_cancel_reaches_client() {
    let catalog = catalog(vec![definition("cities", JobKind::Content, 6)]);
    let server_stores = RunStores::temporary(3600).unwrap();
    let handler = server(catalog, &server_stores);

    let start = StepRequest {
        step_size: 2,
        target_count: 6,
        stop_on_error: true,
        ..StepRequest::new(StepAction::Start, "cities", "run-a")
    };
    assert!(handler.handle(&start).await.success);
    assert!(server_stores.cursors.mark_cancelled("cities").unwrap());

    let step = StepRequest {
        action: StepAction::Step,
        ..start.clone()
    };
    let response = handler.handle(&step).await;
    assert!(!response.success);
    assert_eq!(response.status.as_deref(), Some("cancelled"));
}
