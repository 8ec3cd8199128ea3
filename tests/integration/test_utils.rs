//! Shared test utilities for integration tests
//!
//! Provides isolated XDG directories, job fixtures and a scripted executor.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bulkgen::cursor::{FinalStatus, ProgressCursor};
use bulkgen::error::RunError;
use bulkgen::generation::{
    GenerationResult, LifecycleObserver, StepSlice, TransportError, WorkUnitExecutor,
};
use bulkgen::job::{JobCatalog, JobConfiguration, JobDefinition};
use bulkgen::types::JobKind;
use tempfile::TempDir;
use tokio::time::Instant;

/// Global mutex to serialize XDG environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    xdg_data_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            xdg_data_home: std::env::var("XDG_DATA_HOME").ok(),
        }
    }

    fn restore(self) {
        restore_var("HOME", self.home);
        restore_var("XDG_CONFIG_HOME", self.xdg_config_home);
        restore_var("XDG_DATA_HOME", self.xdg_data_home);
    }
}

fn restore_var(key: &str, value: Option<String>) {
    match value {
        Some(orig) => std::env::set_var(key, orig),
        None => std::env::remove_var(key),
    }
}

/// Run `f` with HOME and XDG directories pointing into `test_dir`.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config");
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    std::env::set_var("XDG_DATA_HOME", test_data_home.to_str().unwrap());

    let result = f();

    env_state.restore();
    result
}

pub fn rows(count: usize, prefix: &str) -> Vec<BTreeMap<String, String>> {
    (0..count)
        .map(|i| BTreeMap::from([("title".to_string(), format!("{prefix} {i}"))]))
        .collect()
}

pub fn definition(id: &str, kind: JobKind, count: usize) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        kind,
        title: id.to_string(),
        description: String::new(),
        title_field: "title".to_string(),
        rows: rows(count, id),
    }
}

pub fn catalog(definitions: Vec<JobDefinition>) -> Arc<JobCatalog> {
    let mut catalog = JobCatalog::new();
    for definition in definitions {
        catalog.insert(definition).unwrap();
    }
    Arc::new(catalog)
}

/// Write `jobs/<id>.toml` under the workspace.
pub fn write_job_file(workspace: &Path, id: &str, kind: JobKind, count: usize) {
    let jobs = workspace.join("jobs");
    std::fs::create_dir_all(&jobs).unwrap();
    let mut body = format!("kind = \"{}\"\ntitle = \"{}\"\n", kind.as_str(), id);
    for i in 0..count {
        body.push_str(&format!("\n[[rows]]\ntitle = \"{} row {}\"\n", id, i));
    }
    std::fs::write(jobs.join(format!("{}.toml", id)), body).unwrap();
}

/// Workspace-local config that keeps logs and retries out of the way.
pub fn write_workspace_config(workspace: &Path, extra: &str) {
    let config_dir = workspace.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let body = format!(
        "[generation]\nretry_pause_ms = 0\n\n[logging]\nenabled = false\n{}",
        extra
    );
    std::fs::write(config_dir.join("config.toml"), body).unwrap();
}

pub fn job_config(job_id: &str, target: u64, step: u32, stop_on_error: bool) -> JobConfiguration {
    JobConfiguration::builder(job_id)
        .target_count(target)
        .step_size(step)
        .stop_on_error(stop_on_error)
        .retry_pause_ms(0)
        .build()
        .unwrap()
}

/// Replays scripted replies in order, then succeeds for every slot. Records
/// the offset and the (tokio) time of every call.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<VecDeque<Result<Vec<GenerationResult>, TransportError>>>,
    offsets: Mutex<Vec<u64>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Result<Vec<GenerationResult>, TransportError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_successes(&self, count: usize) {
        self.push(Ok((0..count)
            .map(|i| GenerationResult::success(format!("scripted {i}"), None, None))
            .collect()));
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }

    /// Time elapsed between each call and the one before it.
    pub fn gaps(&self) -> Vec<std::time::Duration> {
        self.calls
            .lock()
            .unwrap()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[async_trait]
impl WorkUnitExecutor for ScriptedExecutor {
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError> {
        self.offsets.lock().unwrap().push(slice.offset);
        self.calls.lock().unwrap().push(Instant::now());
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok((0..slice.batch_len())
                .map(|i| {
                    GenerationResult::success(format!("item {}", slice.offset + i), None, None)
                })
                .collect())
        })
    }
}

/// Counts lifecycle notifications.
#[derive(Default)]
pub struct CountingObserver {
    pub starts: AtomicUsize,
    pub finishes: AtomicUsize,
    pub last_status: Mutex<Option<FinalStatus>>,
}

impl CountingObserver {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifecycleObserver for CountingObserver {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_start(
        &self,
        _config: &JobConfiguration,
        _cursor: &ProgressCursor,
    ) -> Result<(), RunError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_finish(
        &self,
        _config: &JobConfiguration,
        _cursor: &ProgressCursor,
        status: FinalStatus,
    ) -> Result<(), RunError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        *self.last_status.lock().unwrap() = Some(status);
        Ok(())
    }
}
