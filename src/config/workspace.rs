//! Workspace-relative storage locations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Directory scanned for job definition files
    #[serde(default = "default_jobs_path")]
    pub jobs_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".bulkgen/store")
}

fn default_jobs_path() -> PathBuf {
    PathBuf::from("jobs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            jobs_path: default_jobs_path(),
        }
    }
}

impl StorageConfig {
    /// Resolve both paths against the workspace root. Absolute paths are kept.
    pub fn resolve_paths(&self, workspace_root: &Path) -> (PathBuf, PathBuf) {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                workspace_root.join(path)
            }
        };
        (resolve(&self.store_path), resolve(&self.jobs_path))
    }
}
