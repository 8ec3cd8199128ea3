//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{
    Cli, Commands, GenerateCommands, ListCommands, MaintenanceArgs, RunArgs, TestCommands,
};
pub use presentation::{
    format_cursor_status, format_job_list_json, format_job_list_text, format_log_entries,
    format_maintenance_report, format_preview, format_run_summaries_json,
    format_run_summary_text, format_section_heading, JobListEntry,
};
pub use route::RunContext;
