//! Shared presentation helpers: headings, tables and json encoding.

use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cursor::FinalStatus;
use crate::error::RunError;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn styled_status(status: FinalStatus) -> String {
    match status {
        FinalStatus::Completed => format!("{}", status.as_str().green()),
        FinalStatus::Cancelled => format!("{}", status.as_str().yellow()),
        FinalStatus::Aborted => format!("{}", status.as_str().red()),
    }
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    table
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, RunError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| RunError::ConfigError(format!("Failed to encode output: {}", e)))
}
