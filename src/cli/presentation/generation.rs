//! Generation presentation: run summaries, previews, cursor status and result logs.

use serde_json::json;

use crate::cli::presentation::shared::{format_section_heading, new_table, styled_status, to_json};
use crate::cursor::ProgressCursor;
use crate::error::RunError;
use crate::generation::{Outcome, RunSummary};
use crate::job::JobDefinition;
use crate::results::{EntryKind, LogEntry};
use crate::types::JobKind;

pub fn format_run_summary_text(summary: &RunSummary, kind: JobKind) -> String {
    let mut out = format!(
        "Job {} ({}): {} {} of {} generated, run {}\n",
        summary.job_id,
        kind,
        styled_status(summary.status),
        summary.processed_count,
        summary.target_count,
        summary.nonce
    );
    out.push_str(&format!(
        "  Offsets: {} -> {}  Steps: {}  Retries: {}",
        summary.start_offset, summary.resume_offset, summary.steps_issued, summary.retries
    ));
    if let Some(reason) = &summary.abort_reason {
        out.push_str(&format!("\n  Reason: {}", reason));
    }
    out
}

pub fn format_run_summaries_json(summaries: &[RunSummary]) -> Result<String, RunError> {
    to_json(&json!({ "runs": summaries, "total": summaries.len() }))
}

/// What `test` shows: the first row's item without anything written.
pub fn format_preview(definition: &JobDefinition, summary: &RunSummary) -> String {
    let noun = definition.kind.item_noun();
    match definition.title_at(0) {
        Ok(title) if summary.processed_count > 0 => format!(
            "Test {} #0 for job {}: {}\nNothing was written.",
            noun, definition.id, title
        ),
        Ok(_) => format!(
            "Preview of job {} did not produce a {} ({})",
            definition.id,
            noun,
            summary.abort_reason.as_deref().unwrap_or("no result")
        ),
        Err(reason) => format!("Job {} cannot produce a {}: {}", definition.id, noun, reason),
    }
}

pub fn format_cursor_status(
    job_id: &str,
    cursor: Option<&ProgressCursor>,
    format: &str,
) -> Result<String, RunError> {
    let Some(cursor) = cursor else {
        return Ok(if format == "json" {
            to_json(&json!({ "job_id": job_id, "run": null }))?
        } else {
            format!("Job {} has no recorded run.", job_id)
        });
    };
    if format == "json" {
        return to_json(cursor);
    }

    let mut out = format!("{}\n", format_section_heading(&format!("Job {}", job_id)));
    let mut table = new_table(vec!["Field", "Value"]);
    let status = match cursor.final_status {
        Some(status) => styled_status(status),
        None => cursor.phase.as_str().to_string(),
    };
    table.add_row(vec!["Run".to_string(), cursor.nonce.clone()]);
    table.add_row(vec!["Status".to_string(), status]);
    table.add_row(vec![
        "Progress".to_string(),
        format!("{} / {}", cursor.processed_count, cursor.target_count),
    ]);
    table.add_row(vec![
        "Offsets".to_string(),
        format!("{} -> {}", cursor.run_start_offset, cursor.resume_offset),
    ]);
    table.add_row(vec!["Steps".to_string(), cursor.steps_issued.to_string()]);
    table.add_row(vec!["Retries".to_string(), cursor.retries.to_string()]);
    if cursor.cancelled && !cursor.is_done() {
        table.add_row(vec!["Cancel".to_string(), "requested".to_string()]);
    }
    if let Some(reason) = &cursor.abort_reason {
        table.add_row(vec!["Reason".to_string(), reason.clone()]);
    }
    out.push_str(&table.to_string());
    Ok(out)
}

pub fn format_log_entries(
    job_id: &str,
    nonce: &str,
    entries: &[LogEntry],
    format: &str,
) -> Result<String, RunError> {
    if format == "json" {
        return to_json(&json!({ "job_id": job_id, "run": nonce, "entries": entries }));
    }
    if entries.is_empty() {
        return Ok(format!("Run {} of job {} has no log entries.", nonce, job_id));
    }

    let mut out = format!(
        "{}\n",
        format_section_heading(&format!("Run {} of job {}", nonce, job_id))
    );
    let mut table = new_table(vec!["#", "Time", "Offset", "Kind", "Outcome", "Message"]);
    for entry in entries {
        let kind = match entry.kind {
            EntryKind::Item => "item",
            EntryKind::RunStarted => "started",
            EntryKind::RunFinished => "finished",
        };
        let outcome = match entry.outcome {
            Outcome::Success => "ok",
            Outcome::Error => "error",
        };
        table.add_row(vec![
            entry.seq.to_string(),
            entry.ts.clone(),
            entry.offset.to_string(),
            kind.to_string(),
            outcome.to_string(),
            entry.message.clone(),
        ]);
    }
    out.push_str(&table.to_string());
    let errors = entries
        .iter()
        .filter(|e| e.outcome == Outcome::Error)
        .count();
    out.push_str(&format!("\n{} entries, {} errors", entries.len(), errors));
    Ok(out)
}
