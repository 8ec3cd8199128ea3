//! Configuration System
//!
//! Layered configuration: built-in defaults, the user's global file, the
//! workspace `config/` directory and `BULKGEN__*` environment variables, in
//! increasing order of precedence.

use crate::job::GenerationSettings;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod paths;
mod sources;
mod workspace;

pub use facade::ConfigLoader;
pub use workspace::StorageConfig;

/// Re-export of XDG path helpers
pub mod xdg {
    pub use super::paths::xdg_root::*;
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkgenConfig {
    /// Workspace root path (defaults to current directory)
    pub workspace_root: Option<PathBuf>,

    /// System-wide settings
    #[serde(default)]
    pub system: SystemConfig,

    /// Defaults for every generation run
    #[serde(default)]
    pub generation: GenerationSettings,

    /// HTTP settings for remote runs
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Result log retention
    #[serde(default)]
    pub results: ResultsSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// System-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSettings {
    /// Finished runs whose result log is kept per job; 0 keeps everything
    #[serde(default = "default_keep_runs")]
    pub keep_runs: usize,
}

fn default_keep_runs() -> usize {
    20
}

impl Default for ResultsSettings {
    fn default() -> Self {
        Self {
            keep_runs: default_keep_runs(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Generation(String),
    Remote(String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Remote(msg) => write!(f, "Remote: {}", msg),
            ValidationError::System(msg) => write!(f, "System: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.store_path.as_os_str().is_empty() {
            return Err("Store path cannot be empty".to_string());
        }
        if self.storage.jobs_path.as_os_str().is_empty() {
            return Err("Jobs path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl RemoteSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

impl BulkgenConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.generation.validate() {
            errors.push(ValidationError::Generation(e));
        }
        if let Err(e) = self.remote.validate() {
            errors.push(ValidationError::Remote(e));
        }
        if let Err(e) = self.system.validate() {
            errors.push(ValidationError::System(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
