//! Generated item store
//!
//! Holds the content items and terms produced by local runs. Items are keyed by
//! a monotonic id and indexed by `(job_id, row index)` so a retried step rewrites
//! the item it already produced instead of creating a second one.

pub mod persistence;

pub use persistence::SledItemStore;

use crate::error::StorageError;
use crate::types::JobKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Published,
    Trashed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Published => "published",
            ItemStatus::Trashed => "trashed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub id: u64,
    pub job_id: String,
    pub kind: JobKind,
    /// Row offset the item was produced from
    pub index: u64,
    pub title: String,
    pub created_at_ms: u64,
    pub status: ItemStatus,
}

/// Result of writing an item at a row index.
#[derive(Debug, Clone)]
pub struct ItemWrite {
    pub item: GeneratedItem,
    /// False when an item for the same index already existed and was rewritten
    pub created: bool,
}

pub trait ItemStore: Send + Sync {
    fn get(&self, id: u64) -> Result<Option<GeneratedItem>, StorageError>;

    fn upsert_at_index(
        &self,
        job_id: &str,
        kind: JobKind,
        index: u64,
        title: &str,
        created_at_ms: u64,
    ) -> Result<ItemWrite, StorageError>;

    /// All items of a job ordered by creation time, then id.
    fn list_for_job(&self, job_id: &str) -> Result<Vec<GeneratedItem>, StorageError>;

    fn set_status(&self, id: u64, status: ItemStatus) -> Result<bool, StorageError>;

    fn remove(&self, id: u64) -> Result<bool, StorageError>;

    fn count_for_job(&self, job_id: &str, status: ItemStatus) -> Result<usize, StorageError> {
        Ok(self
            .list_for_job(job_id)?
            .iter()
            .filter(|item| item.status == status)
            .count())
    }
}
