//! Request and response shapes of the step protocol.

use serde::{Deserialize, Serialize};

use crate::generation::result::GenerationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Start,
    Step,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub action: StepAction,
    pub job_id: String,
    pub nonce: String,
    #[serde(default)]
    pub current_offset: u64,
    #[serde(default)]
    pub step_size: u32,
    #[serde(default)]
    pub target_count: u64,
    #[serde(default)]
    pub resume_offset: u64,
    #[serde(default)]
    pub last_marker: Option<String>,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_pause_ms: Option<u64>,
}

impl StepRequest {
    pub fn new(action: StepAction, job_id: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            action,
            job_id: job_id.into(),
            nonce: nonce.into(),
            current_offset: 0,
            step_size: 0,
            target_count: 0,
            resume_offset: 0,
            last_marker: None,
            stop_on_error: false,
            retry_pause_ms: None,
        }
    }
}

/// Either the step's results or a plain message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepData {
    Results(Vec<GenerationResult>),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResponse {
    pub success: bool,
    pub data: StepData,
    /// Run status once the server side has reached `Done` or is finalizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl StepResponse {
    pub fn results(results: Vec<GenerationResult>) -> Self {
        Self {
            success: true,
            data: StepData::Results(results),
            status: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: StepData::Message(message.into()),
            status: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: StepData::Message(message.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Failure message lines, newline-separated on the wire.
    pub fn messages(&self) -> Vec<String> {
        match &self.data {
            StepData::Message(message) => message
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            StepData::Results(results) => results
                .iter()
                .filter(|r| r.is_error())
                .map(|r| r.message.clone())
                .collect(),
        }
    }
}
