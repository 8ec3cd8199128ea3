//! Per-item outcomes and run summaries.

use serde::{Deserialize, Serialize};

use crate::cursor::{FinalStatus, ProgressCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub outcome: Outcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_ref: Option<String>,
    /// Ordering token folded into the cursor's `last_marker`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl GenerationResult {
    pub fn success(
        message: impl Into<String>,
        produced_ref: Option<String>,
        marker: Option<String>,
    ) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.into(),
            produced_ref,
            marker,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Error,
            message: message.into(),
            produced_ref: None,
            marker: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == Outcome::Error
    }
}

/// What a finished (or reloaded) run looks like to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_id: String,
    pub nonce: String,
    pub status: FinalStatus,
    pub processed_count: u64,
    pub target_count: u64,
    pub start_offset: u64,
    pub resume_offset: u64,
    pub steps_issued: u64,
    pub retries: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunSummary {
    pub fn from_cursor(cursor: &ProgressCursor) -> Self {
        Self {
            job_id: cursor.job_id.clone(),
            nonce: cursor.nonce.clone(),
            status: cursor
                .final_status
                .unwrap_or_else(|| cursor.terminal_status()),
            processed_count: cursor.processed_count,
            target_count: cursor.target_count,
            start_offset: cursor.run_start_offset,
            resume_offset: cursor.resume_offset,
            steps_issued: cursor.steps_issued,
            retries: cursor.retries,
            abort_reason: cursor.abort_reason.clone(),
        }
    }
}
