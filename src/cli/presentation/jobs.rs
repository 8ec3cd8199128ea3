//! Job listing presentation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cli::presentation::shared::{new_table, to_json};
use crate::error::RunError;
use crate::types::JobKind;

/// One row of `list content` / `list terms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListEntry {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rows: u64,
    /// Published items currently attributed to the job
    pub generated: usize,
    /// Phase or final status of the latest run
    pub last_run: Option<String>,
}

pub fn format_job_list_text(kind: JobKind, entries: &[JobListEntry]) -> String {
    if entries.is_empty() {
        return format!("No {} jobs found.", kind);
    }
    let mut table = new_table(vec!["Id", "Title", "Description", "Rows", "Generated", "Last run"]);
    for entry in entries {
        table.add_row(vec![
            entry.id.clone(),
            entry.title.clone(),
            entry.description.clone(),
            entry.rows.to_string(),
            entry.generated.to_string(),
            entry.last_run.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!("{}\n\nTotal: {} {} job(s)", table, entries.len(), kind)
}

pub fn format_job_list_json(kind: JobKind, entries: &[JobListEntry]) -> Result<String, RunError> {
    to_json(&json!({ "kind": kind, "jobs": entries, "total": entries.len() }))
}
