//! Typed run configuration for one generation job.

use crate::error::RunError;
use crate::types::JobKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied to every run unless a caller overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Items requested per executor invocation
    #[serde(default = "default_step_size")]
    pub step_size: u32,

    /// Abort the run on the first item-level or transport error
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,

    /// Delay before retrying the same offset after a non-fatal error
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,

    /// Hook id invoked once when a run starts
    #[serde(default = "default_hook_id")]
    pub start_hook: String,

    /// Hook id invoked once when a run finishes
    #[serde(default = "default_hook_id")]
    pub finish_hook: String,

    /// Age after which a run lock left behind by a dead process may be taken over
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

fn default_step_size() -> u32 {
    1
}

fn default_stop_on_error() -> bool {
    true
}

fn default_retry_pause_ms() -> u64 {
    1000
}

fn default_hook_id() -> String {
    "log".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    60 * 60
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            stop_on_error: default_stop_on_error(),
            retry_pause_ms: default_retry_pause_ms(),
            start_hook: default_hook_id(),
            finish_hook: default_hook_id(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.step_size == 0 {
            return Err("step_size must be at least 1".to_string());
        }
        if self.start_hook.trim().is_empty() || self.finish_hook.trim().is_empty() {
            return Err("hook ids cannot be empty (use \"none\" to disable)".to_string());
        }
        Ok(())
    }
}

/// Immutable description of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfiguration {
    pub job_id: String,
    pub kind: JobKind,
    /// Total items to produce in this run. Zero until resolved means "use the estimate".
    pub target_count: u64,
    pub step_size: u32,
    pub stop_on_error: bool,
    pub retry_pause_ms: u64,
    pub start_hook_id: String,
    pub finish_hook_id: String,
}

impl JobConfiguration {
    pub fn builder(job_id: impl Into<String>) -> JobConfigurationBuilder {
        JobConfigurationBuilder::new(job_id.into(), &GenerationSettings::default())
    }

    pub fn builder_with(
        job_id: impl Into<String>,
        settings: &GenerationSettings,
    ) -> JobConfigurationBuilder {
        JobConfigurationBuilder::new(job_id.into(), settings)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    /// Replace a zero target with the job definition's remaining estimate.
    pub fn resolve_target(mut self, remaining_estimate: u64) -> Self {
        if self.target_count == 0 {
            self.target_count = remaining_estimate;
        }
        self
    }
}

pub struct JobConfigurationBuilder {
    job_id: String,
    kind: JobKind,
    target_count: u64,
    step_size: u32,
    stop_on_error: bool,
    retry_pause_ms: u64,
    start_hook_id: String,
    finish_hook_id: String,
}

impl JobConfigurationBuilder {
    fn new(job_id: String, settings: &GenerationSettings) -> Self {
        Self {
            job_id,
            kind: JobKind::Content,
            target_count: 0,
            step_size: settings.step_size,
            stop_on_error: settings.stop_on_error,
            retry_pause_ms: settings.retry_pause_ms,
            start_hook_id: settings.start_hook.clone(),
            finish_hook_id: settings.finish_hook.clone(),
        }
    }

    pub fn kind(mut self, kind: JobKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn target_count(mut self, target_count: u64) -> Self {
        self.target_count = target_count;
        self
    }

    pub fn step_size(mut self, step_size: u32) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn retry_pause_ms(mut self, retry_pause_ms: u64) -> Self {
        self.retry_pause_ms = retry_pause_ms;
        self
    }

    pub fn start_hook(mut self, hook_id: impl Into<String>) -> Self {
        self.start_hook_id = hook_id.into();
        self
    }

    pub fn finish_hook(mut self, hook_id: impl Into<String>) -> Self {
        self.finish_hook_id = hook_id.into();
        self
    }

    pub fn build(self) -> Result<JobConfiguration, RunError> {
        if self.job_id.trim().is_empty() {
            return Err(RunError::InvalidJob("job id cannot be empty".to_string()));
        }
        if self.step_size == 0 {
            return Err(RunError::InvalidJob(format!(
                "step_size must be at least 1 for job {}",
                self.job_id
            )));
        }
        Ok(JobConfiguration {
            job_id: self.job_id,
            kind: self.kind,
            target_count: self.target_count,
            step_size: self.step_size,
            stop_on_error: self.stop_on_error,
            retry_pause_ms: self.retry_pause_ms,
            start_hook_id: self.start_hook_id,
            finish_hook_id: self.finish_hook_id,
        })
    }
}
