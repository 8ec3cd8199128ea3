//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::RunError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &RunError) -> String {
    match e {
        RunError::AlreadyRunning { job_id, holder } => format!(
            "Error: job {} is already running (run {}). Wait for it, or cancel it with `bulkgen cancel {}`.",
            job_id, holder, job_id
        ),
        RunError::JobNotFound(job_id) => format!(
            "Error: job not found: {}. Use `bulkgen list content` or `bulkgen list terms` to see configured jobs.",
            job_id
        ),
        other => format!("Error: {}", other),
    }
}
