//! Generation driver: the resumable batch-run state machine.
//!
//! `Starting → Stepping → (Completing | Cancelling) → Done`. Every transition is
//! persisted through the [`CursorStore`] before the call returns, so any
//! invocation can pick up where the previous one stopped. `begin`, `step` and
//! `finish` are public for adapters that drive one transition per request;
//! `run` loops them for in-process runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cursor::{CursorStore, DriverPhase, FinalStatus, ProgressCursor, RunLock};
use crate::error::RunError;
use crate::generation::executor::{StepSlice, WorkUnitExecutor};
use crate::generation::hooks::CompletionHandler;
use crate::generation::result::{GenerationResult, RunSummary};
use crate::job::JobConfiguration;
use crate::results::{EntryKind, LogEntry, ResultLog};

/// Message of the synthetic error for a successful call that returned nothing.
pub const EMPTY_BATCH_ERROR: &str = "executor returned an empty batch";

/// In-process cancellation request, observed at the top of the next step.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDisposition {
    /// Offset moved forward; `folded` results counted toward the target
    Advanced { folded: u64 },
    /// Offset unchanged; the same slice is requested again after `pause`
    Retry { pause: Duration, errors: Vec<String> },
    /// Stop-on-error ended the run; the offset is frozen
    Aborted { reason: String },
    /// Nothing was executed; the run is ready for `finish`
    Finalizing,
}

#[derive(Debug, Clone)]
pub struct StepReport {
    /// Offset the step was issued at
    pub offset: u64,
    pub results: Vec<GenerationResult>,
    pub disposition: StepDisposition,
}

impl StepReport {
    pub fn error_messages(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.is_error())
            .map(|r| r.message.as_str())
            .collect()
    }
}

pub struct GenerationDriver {
    executor: Arc<dyn WorkUnitExecutor>,
    cursors: Arc<dyn CursorStore>,
    locks: RunLock,
    hooks: CompletionHandler,
    results: ResultLog,
    cancel: CancelFlag,
}

impl GenerationDriver {
    pub fn new(
        executor: Arc<dyn WorkUnitExecutor>,
        cursors: Arc<dyn CursorStore>,
        locks: RunLock,
        hooks: CompletionHandler,
        results: ResultLog,
    ) -> Self {
        Self {
            executor,
            cursors,
            locks,
            hooks,
            results,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cursors(&self) -> &Arc<dyn CursorStore> {
        &self.cursors
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// `Starting → Stepping`. A cursor past `Starting` is left alone.
    pub async fn begin(
        &self,
        config: &JobConfiguration,
        cursor: &mut ProgressCursor,
    ) -> Result<(), RunError> {
        if cursor.phase != DriverPhase::Starting {
            debug!(job_id = %cursor.job_id, phase = cursor.phase.as_str(), "begin on started run");
            return Ok(());
        }
        check_offset_range(cursor, config.step_size)?;
        self.locks.acquire(&cursor.job_id, &cursor.nonce)?;
        if self.hooks.on_start(config, cursor).await? {
            self.results.append(LogEntry::lifecycle(
                &cursor.job_id,
                &cursor.nonce,
                EntryKind::RunStarted,
                cursor.resume_offset,
                format!(
                    "Generating {} items from offset {}",
                    cursor.target_count, cursor.run_start_offset
                ),
            ))?;
        }
        cursor.phase = DriverPhase::Stepping;
        self.persist(cursor)?;
        Ok(())
    }

    /// One `Stepping` iteration: at most one executor call, then persist.
    pub async fn step(
        &self,
        config: &JobConfiguration,
        cursor: &mut ProgressCursor,
    ) -> Result<StepReport, RunError> {
        match cursor.phase {
            DriverPhase::Stepping => {}
            DriverPhase::Completing | DriverPhase::Cancelling => {
                return Ok(self.finalizing(cursor));
            }
            DriverPhase::Starting | DriverPhase::Done => {
                return Err(RunError::InvalidState(format!(
                    "cannot step job {} in phase {}",
                    cursor.job_id,
                    cursor.phase.as_str()
                )));
            }
        }
        self.locks.ensure_held(&cursor.job_id, &cursor.nonce)?;

        if self.cancel.is_cancelled() || self.cancelled_elsewhere(cursor)? {
            cursor.cancel();
        }
        if cursor.cancelled {
            cursor.phase = DriverPhase::Cancelling;
            self.persist(cursor)?;
            return Ok(self.finalizing(cursor));
        }
        if cursor.processed_count >= cursor.target_count {
            cursor.phase = DriverPhase::Completing;
            self.persist(cursor)?;
            return Ok(self.finalizing(cursor));
        }

        self.hooks.before_step(config, cursor).await;

        let offset = cursor.resume_offset;
        let slice = StepSlice {
            job_id: cursor.job_id.clone(),
            nonce: cursor.nonce.clone(),
            offset,
            step_size: config.step_size,
            target_count: cursor.target_count,
            processed_count: cursor.processed_count,
            run_start_offset: cursor.run_start_offset,
            last_marker: cursor.last_marker.clone(),
        };
        cursor.steps_issued += 1;
        let results = match self.executor.next(&slice).await {
            Ok(results) if results.is_empty() => vec![GenerationResult::error(EMPTY_BATCH_ERROR)],
            Ok(results) => results,
            Err(e) => vec![GenerationResult::error(e.message_or_default())],
        };

        for result in &results {
            self.results.append(LogEntry::item(
                &cursor.job_id,
                &cursor.nonce,
                offset,
                result,
            ))?;
        }

        let errors: Vec<String> = results
            .iter()
            .filter(|r| r.is_error())
            .map(|r| r.message.clone())
            .collect();

        let disposition = if errors.is_empty() {
            let mut folded = 0;
            for result in &results {
                if cursor.processed_count >= cursor.target_count {
                    break;
                }
                cursor.processed_count += 1;
                cursor.fold_marker(result.marker.as_deref());
                folded += 1;
            }
            cursor.resume_offset = next_offset(cursor, config.step_size)?;
            if cursor.processed_count >= cursor.target_count {
                cursor.phase = DriverPhase::Completing;
            }
            debug!(
                job_id = %cursor.job_id,
                offset,
                folded,
                processed = cursor.processed_count,
                "step advanced"
            );
            StepDisposition::Advanced { folded }
        } else if config.stop_on_error {
            let reason = errors.join("\n");
            cursor.abort(reason.clone());
            cursor.phase = DriverPhase::Cancelling;
            warn!(job_id = %cursor.job_id, offset, reason = %reason, "step failed, aborting run");
            StepDisposition::Aborted { reason }
        } else {
            cursor.retries += 1;
            warn!(
                job_id = %cursor.job_id,
                offset,
                errors = errors.len(),
                retry_in_ms = config.retry_pause_ms,
                "step failed, will retry"
            );
            StepDisposition::Retry {
                pause: config.retry_pause(),
                errors,
            }
        };

        self.persist(cursor)?;
        Ok(StepReport {
            offset,
            results,
            disposition,
        })
    }

    /// `Completing | Cancelling → Done`. A run stopped early while still
    /// `Stepping` is treated as cancelled.
    pub async fn finish(
        &self,
        config: &JobConfiguration,
        cursor: &mut ProgressCursor,
    ) -> Result<FinalStatus, RunError> {
        match cursor.phase {
            DriverPhase::Starting => {
                return Err(RunError::InvalidState(format!(
                    "job {} has not started",
                    cursor.job_id
                )));
            }
            DriverPhase::Done => {
                return Ok(cursor
                    .final_status
                    .unwrap_or_else(|| cursor.terminal_status()));
            }
            DriverPhase::Stepping => {
                if cursor.processed_count < cursor.target_count {
                    cursor.cancel();
                }
                cursor.phase = if cursor.cancelled {
                    DriverPhase::Cancelling
                } else {
                    DriverPhase::Completing
                };
                self.persist(cursor)?;
            }
            DriverPhase::Completing | DriverPhase::Cancelling => {}
        }

        let status = cursor.terminal_status();
        if self.hooks.on_finish(config, cursor, status).await? {
            self.results.append(LogEntry::lifecycle(
                &cursor.job_id,
                &cursor.nonce,
                EntryKind::RunFinished,
                cursor.resume_offset,
                format!(
                    "Run {}: {} of {} items",
                    status, cursor.processed_count, cursor.target_count
                ),
            ))?;
        }
        self.locks.release(&cursor.job_id, &cursor.nonce)?;
        cursor.final_status = Some(status);
        cursor.phase = DriverPhase::Done;
        self.persist(cursor)?;
        info!(
            job_id = %cursor.job_id,
            status = status.as_str(),
            processed = cursor.processed_count,
            steps = cursor.steps_issued,
            retries = cursor.retries,
            "run done"
        );
        Ok(status)
    }

    /// Drive the cursor to `Done`. A cursor already done is returned as-is.
    pub async fn run(
        &self,
        config: &JobConfiguration,
        mut cursor: ProgressCursor,
    ) -> Result<RunSummary, RunError> {
        if cursor.is_done() {
            return Ok(RunSummary::from_cursor(&cursor));
        }
        self.begin(config, &mut cursor).await?;
        while cursor.phase == DriverPhase::Stepping {
            let report = self.step(config, &mut cursor).await?;
            if let StepDisposition::Retry { pause, .. } = report.disposition {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = self.cancel.cancelled() => {
                        debug!(job_id = %cursor.job_id, "retry pause cut short by cancel");
                    }
                }
            }
        }
        self.finish(config, &mut cursor).await?;
        Ok(RunSummary::from_cursor(&cursor))
    }

    fn finalizing(&self, cursor: &ProgressCursor) -> StepReport {
        StepReport {
            offset: cursor.resume_offset,
            results: Vec::new(),
            disposition: StepDisposition::Finalizing,
        }
    }

    /// Another process may have set the persisted cancelled flag for this run.
    fn cancelled_elsewhere(&self, cursor: &ProgressCursor) -> Result<bool, RunError> {
        Ok(self
            .cursors
            .load(&cursor.job_id)?
            .map(|stored| stored.nonce == cursor.nonce && stored.cancelled)
            .unwrap_or(false))
    }

    fn persist(&self, cursor: &mut ProgressCursor) -> Result<(), RunError> {
        cursor.touch();
        self.cursors.save(cursor)?;
        Ok(())
    }
}

/// Offset after one more step, or an error if it does not fit in a `u64`.
fn next_offset(cursor: &ProgressCursor, step_size: u32) -> Result<u64, RunError> {
    cursor
        .resume_offset
        .checked_add(u64::from(step_size))
        .ok_or_else(|| offset_overflow(cursor))
}

/// A run issues at most `ceil(target / step)` steps, so its offsets stay below
/// `start + target + step`.
fn check_offset_range(cursor: &ProgressCursor, step_size: u32) -> Result<(), RunError> {
    cursor
        .run_start_offset
        .checked_add(cursor.target_count)
        .and_then(|end| end.checked_add(u64::from(step_size)))
        .map(|_| ())
        .ok_or_else(|| offset_overflow(cursor))
}

fn offset_overflow(cursor: &ProgressCursor) -> RunError {
    RunError::InvalidJob(format!(
        "offset {} with target {} is out of range for job {}",
        cursor.run_start_offset, cursor.target_count, cursor.job_id
    ))
}
