//! Log entry schema.

use serde::{Deserialize, Serialize};

use crate::generation::result::{GenerationResult, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Item,
    RunStarted,
    RunFinished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: String,
    pub job_id: String,
    pub nonce: String,
    /// Assigned on append; monotonic within one run
    #[serde(default)]
    pub seq: u64,
    pub kind: EntryKind,
    /// Step offset the entry was produced at
    pub offset: u64,
    pub outcome: Outcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl LogEntry {
    pub fn item(job_id: &str, nonce: &str, offset: u64, result: &GenerationResult) -> Self {
        Self {
            ts: now_rfc3339(),
            job_id: job_id.to_string(),
            nonce: nonce.to_string(),
            seq: 0,
            kind: EntryKind::Item,
            offset,
            outcome: result.outcome,
            message: result.message.clone(),
            produced_ref: result.produced_ref.clone(),
            marker: result.marker.clone(),
        }
    }

    pub fn lifecycle(
        job_id: &str,
        nonce: &str,
        kind: EntryKind,
        offset: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts: now_rfc3339(),
            job_id: job_id.to_string(),
            nonce: nonce.to_string(),
            seq: 0,
            kind,
            offset,
            outcome: Outcome::Success,
            message: message.into(),
            produced_ref: None,
            marker: None,
        }
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
