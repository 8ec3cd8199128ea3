//! Error types for the bulk generation system.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt record under key {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn from_sled(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    }

    pub(crate) fn corrupt(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StorageError::Corrupt {
            key: key.into(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the driver, maintenance operations and adapters
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Job {job_id} is already running under run {holder}")]
    AlreadyRunning { job_id: String, holder: String },

    #[error("Invalid cursor state: {0}")]
    InvalidState(String),

    #[error("Wire protocol error: {0}")]
    Wire(String),

    #[error("Hook not registered: {0}")]
    HookNotFound(String),

    #[error("Maintenance on {job_id} failed after {affected} items: {message}")]
    MaintenanceFailed {
        job_id: String,
        affected: usize,
        message: String,
    },

    #[error("Generation aborted for {job_id}: {reason}")]
    Aborted {
        job_id: String,
        reason: String,
        /// Summaries of the runs finished before the command stopped
        report: String,
    },
}

impl From<config::ConfigError> for RunError {
    fn from(err: config::ConfigError) -> Self {
        RunError::ConfigError(err.to_string())
    }
}
