//! Progress cursor: the externally persisted resume state of one run.

pub mod lock;
pub mod store;

pub use lock::{LockRecord, RunLock};
pub use store::{CursorStore, MemoryCursorStore, SledCursorStore};

use crate::types::now_millis;
use serde::{Deserialize, Serialize};

/// Driver state machine phase, persisted with the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    Starting,
    Stepping,
    Completing,
    Cancelling,
    Done,
}

impl DriverPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverPhase::Starting => "starting",
            DriverPhase::Stepping => "stepping",
            DriverPhase::Completing => "completing",
            DriverPhase::Cancelling => "cancelling",
            DriverPhase::Done => "done",
        }
    }
}

/// Terminal status attached to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Completed,
    Cancelled,
    Aborted,
}

impl FinalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalStatus::Completed => "completed",
            FinalStatus::Cancelled => "cancelled",
            FinalStatus::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub job_id: String,
    /// Run-nonce; hooks are keyed on job id plus this value
    pub nonce: String,
    pub phase: DriverPhase,
    /// Offset this run began at
    pub run_start_offset: u64,
    /// Resolved target, kept so a resumed run keeps its original goal
    pub target_count: u64,
    /// Next offset to request; only ever moves forward
    pub resume_offset: u64,
    pub processed_count: u64,
    pub last_marker: Option<String>,
    /// Set once, never cleared
    pub cancelled: bool,
    /// Set when stop-on-error ended the run
    pub abort_reason: Option<String>,
    pub final_status: Option<FinalStatus>,
    pub steps_issued: u64,
    pub retries: u64,
    pub updated_at_ms: u64,
}

impl ProgressCursor {
    pub fn fresh(
        job_id: impl Into<String>,
        nonce: impl Into<String>,
        start_offset: u64,
        target_count: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            nonce: nonce.into(),
            phase: DriverPhase::Starting,
            run_start_offset: start_offset,
            target_count,
            resume_offset: start_offset,
            processed_count: 0,
            last_marker: None,
            cancelled: false,
            abort_reason: None,
            final_status: None,
            steps_issued: 0,
            retries: 0,
            updated_at_ms: now_millis(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == DriverPhase::Done
    }

    /// Request cooperative cancellation. Observed at the top of the next step.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Stop-on-error: cancel and remember why.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.cancelled = true;
        if self.abort_reason.is_none() {
            self.abort_reason = Some(reason.into());
        }
    }

    pub fn fold_marker(&mut self, marker: Option<&str>) {
        if let Some(marker) = marker {
            self.last_marker = Some(marker.to_string());
        }
    }

    /// Status the finish hook reports for the cursor as it stands.
    pub fn terminal_status(&self) -> FinalStatus {
        if self.abort_reason.is_some() {
            FinalStatus::Aborted
        } else if self.cancelled {
            FinalStatus::Cancelled
        } else {
            FinalStatus::Completed
        }
    }

    pub fn touch(&mut self) {
        self.updated_at_ms = now_millis();
    }
}
