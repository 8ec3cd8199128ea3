//! Offsets never move backwards and every committed step advances by the step size.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bulkgen::cursor::{FinalStatus, MemoryCursorStore, ProgressCursor, RunLock};
use bulkgen::generation::{
    CompletionHandler, GenerationDriver, GenerationResult, MemoryHookLedger, StepSlice,
    TransportError, WorkUnitExecutor,
};
use bulkgen::job::JobConfiguration;
use bulkgen::results::ResultLog;
use proptest::prelude::*;

/// Fails the calls whose sequence numbers are in `failing`.
struct Flaky {
    failing: BTreeSet<usize>,
    calls: Mutex<Vec<u64>>,
}

#[async_trait]
impl WorkUnitExecutor for Flaky {
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(slice.offset);
            calls.len() - 1
        };
        if self.failing.contains(&call) {
            return Ok(vec![GenerationResult::error(format!("call {call} failed"))]);
        }
        Ok((0..slice.batch_len())
            .map(|i| GenerationResult::success(format!("item {}", slice.offset + i), None, None))
            .collect())
    }
}

#[test]
fn test_offsets_are_monotonic_property() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(64));

    runner
        .run(
            &(
                0u64..50,
                1u64..40,
                1u32..6,
                proptest::collection::btree_set(0usize..20, 0..6),
            ),
            |(start, target, step, failing)| {
                let executor = Arc::new(Flaky {
                    failing,
                    calls: Mutex::new(Vec::new()),
                });
                let db = sled::Config::new().temporary(true).open().unwrap();
                let driver = GenerationDriver::new(
                    executor.clone(),
                    Arc::new(MemoryCursorStore::new()),
                    RunLock::new(&db, 3600).unwrap(),
                    CompletionHandler::new(Arc::new(MemoryHookLedger::new())),
                    ResultLog::new(&db).unwrap(),
                );
                let config = JobConfiguration::builder("cities")
                    .target_count(target)
                    .step_size(step)
                    .stop_on_error(false)
                    .retry_pause_ms(0)
                    .build()
                    .unwrap();

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                let summary = rt
                    .block_on(driver.run(&config, ProgressCursor::fresh("cities", "run-p", start, target)))
                    .unwrap();

                let offsets = executor.calls.lock().unwrap().clone();
                prop_assert_eq!(summary.status, FinalStatus::Completed);
                prop_assert_eq!(summary.processed_count, target);
                prop_assert!(offsets.iter().all(|o| *o >= start));
                prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
                prop_assert!(offsets.iter().all(|o| (o - start) % u64::from(step) == 0));

                let distinct: BTreeSet<u64> = offsets.iter().copied().collect();
                let expected_steps = target.div_ceil(u64::from(step));
                prop_assert_eq!(distinct.len() as u64, expected_steps);
                prop_assert_eq!(
                    summary.resume_offset,
                    start + expected_steps * u64::from(step)
                );
                Ok(())
            },
        )
        .unwrap();
}
