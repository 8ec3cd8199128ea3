//! Bulk maintenance: bounded trash/delete passes over a job's generated items.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RunError;
use crate::items::{GeneratedItem, ItemStatus, ItemStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    /// Move published items to the trash
    Trash,
    /// Remove items permanently, trashed or not
    Delete,
}

impl MaintenanceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceAction::Trash => "trash",
            MaintenanceAction::Delete => "delete",
        }
    }

    fn is_eligible(self, item: &GeneratedItem) -> bool {
        match self {
            MaintenanceAction::Trash => item.status == ItemStatus::Published,
            MaintenanceAction::Delete => true,
        }
    }
}

/// Upper bound on items touched by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemLimit {
    Bounded(usize),
    #[default]
    Unbounded,
}

impl ItemLimit {
    fn allows(self, affected: usize) -> bool {
        match self {
            ItemLimit::Bounded(max) => affected < max,
            ItemLimit::Unbounded => true,
        }
    }
}

impl FromStr for ItemLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "-1" | "all" | "unbounded" => Ok(ItemLimit::Unbounded),
            other => other
                .parse::<usize>()
                .map(ItemLimit::Bounded)
                .map_err(|_| format!("invalid limit '{s}': expected a count, -1 or 'all'")),
        }
    }
}

impl std::fmt::Display for ItemLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemLimit::Bounded(max) => write!(f, "{max}"),
            ItemLimit::Unbounded => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceRequest {
    pub job_id: String,
    pub action: MaintenanceAction,
    pub max_items: ItemLimit,
    pub exclude_ids: BTreeSet<u64>,
    /// Count what would be affected without touching the store
    pub dry_run: bool,
}

impl MaintenanceRequest {
    pub fn new(job_id: impl Into<String>, action: MaintenanceAction) -> Self {
        Self {
            job_id: job_id.into(),
            action,
            max_items: ItemLimit::Unbounded,
            exclude_ids: BTreeSet::new(),
            dry_run: false,
        }
    }

    pub fn with_limit(mut self, max_items: ItemLimit) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub job_id: String,
    pub action: MaintenanceAction,
    pub count_affected: usize,
    pub skipped_excluded: usize,
    pub duration_ms: u64,
    /// Ids touched, in processing order
    pub affected_ids: Vec<u64>,
    pub dry_run: bool,
}

pub struct BulkMaintenanceOperation {
    items: Arc<dyn ItemStore>,
}

impl BulkMaintenanceOperation {
    pub fn new(items: Arc<dyn ItemStore>) -> Self {
        Self { items }
    }

    /// Items the request would consider, oldest first, excluded ones included.
    pub fn eligible(&self, request: &MaintenanceRequest) -> Result<Vec<GeneratedItem>, RunError> {
        let items = self.items.list_for_job(&request.job_id)?;
        Ok(items
            .into_iter()
            .filter(|item| request.action.is_eligible(item))
            .collect())
    }

    pub fn run(&self, request: &MaintenanceRequest) -> Result<MaintenanceReport, RunError> {
        let started = Instant::now();
        let candidates = self.eligible(request)?;
        let mut affected_ids = Vec::new();
        let mut skipped_excluded = 0;

        for item in candidates {
            if !request.max_items.allows(affected_ids.len()) {
                break;
            }
            if request.exclude_ids.contains(&item.id) {
                skipped_excluded += 1;
                continue;
            }
            if !request.dry_run {
                let changed = match request.action {
                    MaintenanceAction::Trash => {
                        self.items.set_status(item.id, ItemStatus::Trashed)
                    }
                    MaintenanceAction::Delete => self.items.remove(item.id),
                }
                .map_err(|e| RunError::MaintenanceFailed {
                    job_id: request.job_id.clone(),
                    affected: affected_ids.len(),
                    message: e.to_string(),
                })?;
                if !changed {
                    debug!(item_id = item.id, "item vanished before maintenance");
                    continue;
                }
            }
            affected_ids.push(item.id);
        }

        let report = MaintenanceReport {
            job_id: request.job_id.clone(),
            action: request.action,
            count_affected: affected_ids.len(),
            skipped_excluded,
            duration_ms: started.elapsed().as_millis() as u64,
            affected_ids,
            dry_run: request.dry_run,
        };
        info!(
            job_id = %report.job_id,
            action = report.action.as_str(),
            affected = report.count_affected,
            skipped = report.skipped_excluded,
            dry_run = report.dry_run,
            "maintenance pass finished"
        );
        Ok(report)
    }
}
