//! End-to-end driver runs against persisted cursors, locks and hook ledgers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bulkgen::cursor::{
    CursorStore, DriverPhase, FinalStatus, ProgressCursor, RunLock, SledCursorStore,
};
use bulkgen::error::RunError;
use bulkgen::generation::{
    CompletionHandler, GenerationDriver, GenerationResult, StepDisposition, StepSlice,
    TransportError, WorkUnitExecutor,
};
use bulkgen::results::EntryKind;
use bulkgen::storage::RunStores;

use crate::integration::test_utils::{job_config, CountingObserver, ScriptedExecutor};

fn driver_over(
    stores: &RunStores,
    executor: Arc<ScriptedExecutor>,
    observer: Arc<CountingObserver>,
) -> GenerationDriver {
    GenerationDriver::new(
        executor,
        stores.cursors.clone(),
        stores.locks.clone(),
        CompletionHandler::new(stores.ledger.clone()).with_observer(observer),
        stores.results.clone(),
    )
}

#[tokio::test]
async fn test_offsets_advance_by_step_size_until_target() {
    let stores = RunStores::temporary(3600).unwrap();
    let executor = ScriptedExecutor::new();
    let observer = Arc::new(CountingObserver::default());
    let driver = driver_over(&stores, executor.clone(), observer.clone());

    let config = job_config("cities", 10, 2, true);
    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-a", 0, 10))
        .await
        .unwrap();

    assert_eq!(executor.offsets(), vec![0, 2, 4, 6, 8]);
    assert_eq!(summary.status, FinalStatus::Completed);
    assert_eq!(summary.processed_count, 10);
    assert_eq!(summary.resume_offset, 10);
    assert_eq!(observer.starts(), 1);
    assert_eq!(observer.finishes(), 1);

    let stored = stores.cursors.load("cities").unwrap().unwrap();
    assert_eq!(stored.phase, DriverPhase::Done);
    assert!(stores.locks.holder("cities").unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_step_is_retried_at_same_offset() {
    let stores = RunStores::temporary(3600).unwrap();
    let executor = ScriptedExecutor::new();
    executor.push_successes(2);
    executor.push(Err(TransportError::new("gateway timeout")));
    let driver = driver_over(&stores, executor.clone(), Arc::default());

    let config = bulkgen::job::JobConfiguration::builder("cities")
        .target_count(10)
        .step_size(2)
        .stop_on_error(false)
        .retry_pause_ms(500)
        .build()
        .unwrap();
    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-a", 0, 10))
        .await
        .unwrap();

    assert_eq!(executor.offsets(), vec![0, 2, 2, 4, 6, 8]);
    let gaps = executor.gaps();
    assert!(gaps[1] >= Duration::from_millis(500), "retry waited {:?}", gaps[1]);
    for (i, gap) in gaps.iter().enumerate().filter(|(i, _)| *i != 1) {
        assert!(*gap < Duration::from_millis(500), "step {} waited {:?}", i + 1, gap);
    }
    assert_eq!(summary.status, FinalStatus::Completed);
    assert_eq!(summary.processed_count, 10);
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.steps_issued, 6);

    let entries = stores.results.read_run("cities", "run-a").unwrap();
    assert!(entries
        .iter()
        .any(|e| e.kind == EntryKind::Item && e.message == "gateway timeout"));
}

#[tokio::test]
async fn test_stop_on_error_freezes_offset() {
    let stores = RunStores::temporary(3600).unwrap();
    let executor = ScriptedExecutor::new();
    executor.push_successes(2);
    executor.push_successes(2);
    executor.push(Ok(vec![
        GenerationResult::success("row 4", None, None),
        GenerationResult::error("row 5 has no title"),
    ]));
    let observer = Arc::new(CountingObserver::default());
    let driver = driver_over(&stores, executor.clone(), observer.clone());

    let config = job_config("cities", 10, 2, true);
    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-a", 0, 10))
        .await
        .unwrap();

    assert_eq!(executor.offsets(), vec![0, 2, 4]);
    assert_eq!(summary.status, FinalStatus::Aborted);
    assert_eq!(summary.resume_offset, 4);
    assert_eq!(summary.processed_count, 4);
    assert_eq!(summary.abort_reason.as_deref(), Some("row 5 has no title"));
    assert_eq!(
        *observer.last_status.lock().unwrap(),
        Some(FinalStatus::Aborted)
    );
}

#[tokio::test]
async fn test_restart_resumes_without_repeating_hooks() {
    let stores = RunStores::temporary(3600).unwrap();
    let observer = Arc::new(CountingObserver::default());
    let config = job_config("cities", 6, 2, true);

    {
        let executor = ScriptedExecutor::new();
        let driver = driver_over(&stores, executor.clone(), observer.clone());
        let mut cursor = ProgressCursor::fresh("cities", "run-a", 0, 6);
        driver.begin(&config, &mut cursor).await.unwrap();
        let report = driver.step(&config, &mut cursor).await.unwrap();
        assert_eq!(report.disposition, StepDisposition::Advanced { folded: 2 });
        assert_eq!(executor.offsets(), vec![0]);
        // Process dies here: cursor persisted at Stepping, lock still held.
    }

    let executor = ScriptedExecutor::new();
    let driver = driver_over(&stores, executor.clone(), observer.clone());
    let persisted = stores.cursors.load("cities").unwrap().unwrap();
    assert_eq!(persisted.phase, DriverPhase::Stepping);
    assert_eq!(persisted.resume_offset, 2);

    let summary = driver.run(&config, persisted).await.unwrap();
    assert_eq!(executor.offsets(), vec![2, 4]);
    assert_eq!(summary.processed_count, 6);
    assert_eq!(observer.starts(), 1, "start hook fired once across restarts");
    assert_eq!(observer.finishes(), 1);

    let mut done = stores.cursors.load("cities").unwrap().unwrap();
    let status = driver.finish(&config, &mut done).await.unwrap();
    assert_eq!(status, FinalStatus::Completed);
    assert_eq!(observer.finishes(), 1, "finish hook is not repeated");
}

#[tokio::test]
async fn test_resume_never_reads_below_start_offset() {
    let stores = RunStores::temporary(3600).unwrap();
    let executor = ScriptedExecutor::new();
    let driver = driver_over(&stores, executor.clone(), Arc::default());

    let config = job_config("cities", 3, 2, true);
    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-a", 5, 3))
        .await
        .unwrap();

    let offsets = executor.offsets();
    assert_eq!(offsets, vec![5, 7]);
    assert!(offsets.iter().all(|offset| *offset >= 5));
    assert_eq!(summary.start_offset, 5);
    assert_eq!(summary.processed_count, 3);
}

#[tokio::test]
async fn test_persisted_cancel_stops_before_next_step() {
    let stores = RunStores::temporary(3600).unwrap();
    let executor = ScriptedExecutor::new();
    let observer = Arc::new(CountingObserver::default());
    let driver = driver_over(&stores, executor.clone(), observer.clone());
    let config = job_config("cities", 10, 2, true);

    let mut cursor = ProgressCursor::fresh("cities", "run-a", 0, 10);
    driver.begin(&config, &mut cursor).await.unwrap();
    driver.step(&config, &mut cursor).await.unwrap();

    assert!(stores.cursors.mark_cancelled("cities").unwrap());
    let report = driver.step(&config, &mut cursor).await.unwrap();
    assert_eq!(report.disposition, StepDisposition::Finalizing);
    assert_eq!(executor.offsets(), vec![0]);

    let status = driver.finish(&config, &mut cursor).await.unwrap();
    assert_eq!(status, FinalStatus::Cancelled);
    assert_eq!(cursor.resume_offset, 2);
    assert_eq!(
        *observer.last_status.lock().unwrap(),
        Some(FinalStatus::Cancelled)
    );
}

/// Requests cancellation through the cursor store while its first step is in flight.
struct CancelsMidStep {
    cursors: Arc<SledCursorStore>,
    inner: Arc<ScriptedExecutor>,
}

#[async_trait]
impl WorkUnitExecutor for CancelsMidStep {
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError> {
        if slice.offset == 0 {
            assert!(self.cursors.mark_cancelled(&slice.job_id).unwrap());
        }
        self.inner.next(slice).await
    }
}

#[tokio::test]
async fn test_cancel_during_step_is_not_overwritten() {
    let stores = RunStores::temporary(3600).unwrap();
    let inner = ScriptedExecutor::new();
    let observer = Arc::new(CountingObserver::default());
    let driver = GenerationDriver::new(
        Arc::new(CancelsMidStep {
            cursors: stores.cursors.clone(),
            inner: inner.clone(),
        }),
        stores.cursors.clone(),
        stores.locks.clone(),
        CompletionHandler::new(stores.ledger.clone()).with_observer(observer.clone()),
        stores.results.clone(),
    );

    let config = job_config("cities", 10, 2, true);
    let summary = driver
        .run(&config, ProgressCursor::fresh("cities", "run-a", 0, 10))
        .await
        .unwrap();

    assert_eq!(summary.status, FinalStatus::Cancelled);
    assert_eq!(inner.offsets(), vec![0]);
    assert_eq!(summary.processed_count, 2);
    assert_eq!(summary.resume_offset, 2);
    let stored = stores.cursors.load("cities").unwrap().unwrap();
    assert!(stored.cancelled);
    assert_eq!(stored.final_status, Some(FinalStatus::Cancelled));
}

#[tokio::test]
async fn test_second_driver_cannot_take_a_held_run() {
    let stores = RunStores::temporary(3600).unwrap();
    let driver = driver_over(&stores, ScriptedExecutor::new(), Arc::default());
    let config = job_config("cities", 4, 2, true);
    let mut first = ProgressCursor::fresh("cities", "run-a", 0, 4);
    driver.begin(&config, &mut first).await.unwrap();

    let other_lock = RunLock::new(&stores.db, 3600).unwrap();
    let err = other_lock.acquire("cities", "run-b").unwrap_err();
    assert!(matches!(err, RunError::AlreadyRunning { .. }));
}
