//! Job definitions: the group a run draws its rows from.

use crate::error::RunError;
use crate::types::JobKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Taken from the definition file stem when omitted
    #[serde(default)]
    pub id: String,
    pub kind: JobKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Row column that becomes the generated item's title
    #[serde(default = "default_title_field")]
    pub title_field: String,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, String>>,
}

fn default_title_field() -> String {
    "title".to_string()
}

impl JobDefinition {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.id.trim().is_empty() {
            return Err(RunError::InvalidJob("job definition id cannot be empty".to_string()));
        }
        if self.id.contains(',') || self.id.contains(':') {
            return Err(RunError::InvalidJob(format!(
                "job id '{}' cannot contain ',' or ':'",
                self.id
            )));
        }
        if self.title_field.trim().is_empty() {
            return Err(RunError::InvalidJob(format!(
                "job {} has an empty title_field",
                self.id
            )));
        }
        Ok(())
    }

    pub fn total_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    /// Items still producible for a run that starts at `offset`.
    pub fn remaining_estimate(&self, offset: u64) -> u64 {
        self.total_rows().saturating_sub(offset)
    }

    /// Title for the row at `index`, if the row exists and carries the title column.
    pub fn title_at(&self, index: u64) -> Result<&str, String> {
        let row = usize::try_from(index)
            .ok()
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| format!("No row at index {} for job {}", index, self.id))?;
        row.get(&self.title_field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                format!(
                    "Row {} of job {} has no '{}' value",
                    index, self.id, self.title_field
                )
            })
    }
}
