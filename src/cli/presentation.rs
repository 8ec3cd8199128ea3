//! CLI presentation: text and json formatters per command family.

mod generation;
mod jobs;
mod maintenance;
mod shared;

pub use generation::{
    format_cursor_status, format_log_entries, format_preview, format_run_summaries_json,
    format_run_summary_text,
};
pub use jobs::{format_job_list_json, format_job_list_text, JobListEntry};
pub use maintenance::format_maintenance_report;
pub use shared::format_section_heading;
