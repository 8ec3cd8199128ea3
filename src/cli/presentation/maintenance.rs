//! Maintenance presentation.

use crate::cli::presentation::shared::to_json;
use crate::error::RunError;
use crate::maintenance::{MaintenanceAction, MaintenanceReport};

pub fn format_maintenance_report(
    report: &MaintenanceReport,
    format: &str,
) -> Result<String, RunError> {
    if format == "json" {
        return to_json(report);
    }
    let verb = match (report.action, report.dry_run) {
        (MaintenanceAction::Trash, false) => "Trashed",
        (MaintenanceAction::Delete, false) => "Deleted",
        (MaintenanceAction::Trash, true) => "Would trash",
        (MaintenanceAction::Delete, true) => "Would delete",
    };
    let mut out = format!(
        "{} {} item(s) of job {} in {} ms",
        verb, report.count_affected, report.job_id, report.duration_ms
    );
    if report.skipped_excluded > 0 {
        out.push_str(&format!(", kept {} excluded", report.skipped_excluded));
    }
    Ok(out)
}
