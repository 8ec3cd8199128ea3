//! Job catalog: definitions loaded once from `<jobs_path>/**/*.toml`.
//!
//! The catalog is the static registry that resolves a job id to its definition.
//! Invalid files are logged and skipped so one broken definition does not hide the rest.

use crate::error::RunError;
use crate::job::definition::JobDefinition;
use crate::types::JobKind;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct JobCatalog {
    jobs: BTreeMap<String, JobDefinition>,
}

impl JobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, RunError> {
        let mut catalog = Self::new();
        if !dir.exists() {
            tracing::debug!(jobs_dir = %dir.display(), "jobs directory does not exist");
            return Ok(catalog);
        }

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some(OsStr::new("toml")) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!("Invalid job filename (non-UTF8): {:?}", path);
                continue;
            };
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to read job definition {}: {}", path.display(), e);
                    continue;
                }
            };
            let mut definition: JobDefinition = match toml::from_str(&content) {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!("Failed to parse job definition {}: {}", path.display(), e);
                    continue;
                }
            };
            if definition.id.is_empty() {
                definition.id = stem.to_string();
            }
            if let Err(e) = catalog.insert(definition) {
                tracing::error!("Skipping job definition {}: {}", path.display(), e);
            }
        }

        tracing::info!(jobs = catalog.len(), jobs_dir = %dir.display(), "job catalog loaded");
        Ok(catalog)
    }

    pub fn insert(&mut self, definition: JobDefinition) -> Result<(), RunError> {
        definition.validate()?;
        if self.jobs.contains_key(&definition.id) {
            return Err(RunError::InvalidJob(format!(
                "duplicate job id '{}'",
                definition.id
            )));
        }
        self.jobs.insert(definition.id.clone(), definition);
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Option<&JobDefinition> {
        self.jobs.get(job_id)
    }

    /// Look up a job and require it to be of `kind`.
    pub fn get_or_error(&self, job_id: &str, kind: JobKind) -> Result<&JobDefinition, RunError> {
        let definition = self
            .get(job_id)
            .ok_or_else(|| RunError::JobNotFound(job_id.to_string()))?;
        if definition.kind != kind {
            return Err(RunError::InvalidJob(format!(
                "job {} is a {} job, not {}",
                job_id, definition.kind, kind
            )));
        }
        Ok(definition)
    }

    pub fn list_by_kind(&self, kind: JobKind) -> Vec<&JobDefinition> {
        self.jobs.values().filter(|d| d.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
