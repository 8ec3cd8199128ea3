//! Work unit executors: produce the results of one step.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generation::result::GenerationResult;
use crate::items::ItemStore;
use crate::job::JobCatalog;
use crate::types::now_millis;

/// Message reported when a transport fails without saying why.
pub const UNKNOWN_TRANSPORT_ERROR: &str = "unknown error occurred";

/// Everything an executor needs to produce one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSlice {
    pub job_id: String,
    pub nonce: String,
    pub offset: u64,
    pub step_size: u32,
    pub target_count: u64,
    pub processed_count: u64,
    pub run_start_offset: u64,
    pub last_marker: Option<String>,
}

impl StepSlice {
    /// Items still owed to the run.
    pub fn remaining(&self) -> u64 {
        self.target_count.saturating_sub(self.processed_count)
    }

    /// Items this step should produce.
    pub fn batch_len(&self) -> u64 {
        self.remaining().min(u64::from(self.step_size))
    }
}

/// A step failed as a whole: no per-item results were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub message: Option<String>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn unknown() -> Self {
        Self { message: None }
    }

    pub fn message_or_default(&self) -> String {
        match self.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => UNKNOWN_TRANSPORT_ERROR.to_string(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message_or_default())
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait WorkUnitExecutor: Send + Sync {
    /// Produce the results for `slice`, one per item attempted.
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError>;
}

/// Materializes items from job definition rows into the item store.
///
/// Each row index maps to at most one item, so a retried step rewrites what an
/// earlier attempt produced. `last_marker` carries the creation timestamp of
/// the newest item; new items are stamped strictly after it.
pub struct LocalExecutor {
    catalog: Arc<JobCatalog>,
    items: Arc<dyn ItemStore>,
    preview: bool,
}

impl LocalExecutor {
    pub fn new(catalog: Arc<JobCatalog>, items: Arc<dyn ItemStore>) -> Self {
        Self {
            catalog,
            items,
            preview: false,
        }
    }

    /// Report what would be generated without writing items.
    pub fn preview(catalog: Arc<JobCatalog>, items: Arc<dyn ItemStore>) -> Self {
        Self {
            catalog,
            items,
            preview: true,
        }
    }
}

#[async_trait]
impl WorkUnitExecutor for LocalExecutor {
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError> {
        let definition = self
            .catalog
            .get(&slice.job_id)
            .ok_or_else(|| TransportError::new(format!("Job not found: {}", slice.job_id)))?;
        let noun = definition.kind.item_noun();

        let mut previous = slice
            .last_marker
            .as_deref()
            .and_then(|m| m.parse::<u64>().ok())
            .unwrap_or(0);
        let mut results = Vec::new();

        let end = slice.offset.saturating_add(slice.batch_len());
        for index in slice.offset..end {
            let title = match definition.title_at(index) {
                Ok(title) => title,
                Err(message) => {
                    results.push(GenerationResult::error(message));
                    continue;
                }
            };

            if self.preview {
                results.push(GenerationResult::success(
                    format!("Test {noun} #{index}: {title}"),
                    None,
                    None,
                ));
                continue;
            }

            let created_at = now_millis().max(previous + 1);
            let write = self
                .items
                .upsert_at_index(&definition.id, definition.kind, index, title, created_at)
                .map_err(|e| TransportError::new(e.to_string()))?;
            previous = created_at;

            let verb = if write.created {
                "Created"
            } else {
                "Updated existing"
            };
            results.push(GenerationResult::success(
                format!("{verb} {noun} #{}: {}", write.item.id, write.item.title),
                Some(write.item.id.to_string()),
                Some(created_at.to_string()),
            ));
        }

        Ok(results)
    }
}
