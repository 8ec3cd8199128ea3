//! Orchestration of one `generate` or `test` invocation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RemoteSettings;
use crate::cursor::{CursorStore, MemoryCursorStore, ProgressCursor};
use crate::error::RunError;
use crate::generation::driver::{CancelFlag, GenerationDriver};
use crate::generation::executor::{LocalExecutor, WorkUnitExecutor};
use crate::generation::hooks::{CompletionHandler, HookRegistry};
use crate::generation::result::RunSummary;
use crate::job::{GenerationSettings, JobCatalog, JobConfiguration};
use crate::storage::RunStores;
use crate::types::{new_run_nonce, JobKind};
use crate::wire::{HttpStepTransport, RemoteLifecycle, StepTransport, WireExecutor};

/// Long-lived collaborators shared by every run of one invocation.
#[derive(Clone)]
pub struct RunEnvironment {
    pub catalog: Arc<JobCatalog>,
    pub stores: RunStores,
    pub registry: HookRegistry,
    pub settings: GenerationSettings,
    pub remote: RemoteSettings,
    /// Result log runs kept per job after a run; 0 keeps all
    pub keep_runs: usize,
    pub cancel: CancelFlag,
}

/// Caller overrides for one job's run. `None` falls back to the settings.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub kind: JobKind,
    pub job_id: String,
    /// Row offset a fresh run starts at
    pub resume_index: Option<u64>,
    pub target_count: Option<u64>,
    pub step_size: Option<u32>,
    pub stop_on_error: Option<bool>,
    pub retry_pause_ms: Option<u64>,
    /// Continue the job's unfinished run instead of starting a new one
    pub resume: bool,
    /// Step endpoint of a remote server
    pub remote: Option<String>,
    /// One preview item from offset 0, nothing persisted
    pub dry_run: bool,
}

impl GenerateRequest {
    pub fn new(kind: JobKind, job_id: impl Into<String>) -> Self {
        Self {
            kind,
            job_id: job_id.into(),
            resume_index: None,
            target_count: None,
            step_size: None,
            stop_on_error: None,
            retry_pause_ms: None,
            resume: false,
            remote: None,
            dry_run: false,
        }
    }

    fn configuration(&self, settings: &GenerationSettings) -> Result<JobConfiguration, RunError> {
        let mut builder = JobConfiguration::builder_with(&self.job_id, settings).kind(self.kind);
        if let Some(target_count) = self.target_count {
            builder = builder.target_count(target_count);
        }
        if let Some(step_size) = self.step_size {
            builder = builder.step_size(step_size);
        }
        if let Some(stop_on_error) = self.stop_on_error {
            builder = builder.stop_on_error(stop_on_error);
        }
        if let Some(retry_pause_ms) = self.retry_pause_ms {
            builder = builder.retry_pause_ms(retry_pause_ms);
        }
        builder.build()
    }
}

/// Blocking entry point. Ctrl-C requests cooperative cancellation.
pub fn run_generate(
    env: &RunEnvironment,
    request: &GenerateRequest,
) -> Result<RunSummary, RunError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(RunError::InvalidState(
            "Cannot start a blocking run from within an async runtime; call generate() instead"
                .to_string(),
        ));
    }
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| RunError::ConfigError(format!("Failed to create runtime: {}", e)))?;

    let cancel = env.cancel.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });

    rt.block_on(generate(env, request))
}

pub async fn generate(
    env: &RunEnvironment,
    request: &GenerateRequest,
) -> Result<RunSummary, RunError> {
    let definition = env.catalog.get_or_error(&request.job_id, request.kind)?;
    if request.dry_run {
        return preview(env, request).await;
    }

    let mut config = request.configuration(&env.settings)?;
    let existing = env.stores.cursors.load(&request.job_id)?;
    let cursor = if request.resume {
        let cursor = existing.ok_or_else(|| {
            RunError::InvalidState(format!("Job {} has no run to resume", request.job_id))
        })?;
        if cursor.is_done() {
            return Err(RunError::InvalidState(format!(
                "Run {} of job {} already finished ({})",
                cursor.nonce,
                request.job_id,
                cursor
                    .final_status
                    .unwrap_or_else(|| cursor.terminal_status())
            )));
        }
        if let Some(index) = request.resume_index {
            if index != cursor.resume_offset {
                warn!(
                    job_id = %request.job_id,
                    requested = index,
                    resume_offset = cursor.resume_offset,
                    "ignoring resume index, continuing from the persisted offset"
                );
            }
        }
        config.target_count = cursor.target_count;
        info!(job_id = %request.job_id, nonce = %cursor.nonce, offset = cursor.resume_offset, "resuming run");
        cursor
    } else {
        if let Some(unfinished) = existing.filter(|c| !c.is_done()) {
            return Err(RunError::InvalidState(format!(
                "Job {} has an unfinished run {} at offset {}; resume it with --resume or cancel it first",
                request.job_id, unfinished.nonce, unfinished.resume_offset
            )));
        }
        let start = request.resume_index.unwrap_or(0);
        config = config.resolve_target(definition.remaining_estimate(start));
        ProgressCursor::fresh(&request.job_id, new_run_nonce(), start, config.target_count)
    };

    let mut hooks =
        CompletionHandler::from_registry(&env.registry, &config, env.stores.ledger.clone())?;
    let executor: Arc<dyn WorkUnitExecutor> = match request.remote.as_deref() {
        Some(endpoint) => {
            let transport: Arc<dyn StepTransport> =
                Arc::new(HttpStepTransport::new(endpoint, &env.remote)?);
            hooks = hooks.with_observer(Arc::new(RemoteLifecycle::new(transport.clone())));
            Arc::new(WireExecutor::new(transport, &config).with_cancel_flag(env.cancel.clone()))
        }
        None => Arc::new(LocalExecutor::new(
            env.catalog.clone(),
            env.stores.items.clone(),
        )),
    };

    let driver = GenerationDriver::new(
        executor,
        env.stores.cursors.clone(),
        env.stores.locks.clone(),
        hooks,
        env.stores.results.clone(),
    )
    .with_cancel_flag(env.cancel.clone());
    let summary = driver.run(&config, cursor).await?;

    if env.keep_runs > 0 {
        match env.stores.results.prune_runs(&request.job_id, env.keep_runs) {
            Ok(0) => {}
            Ok(pruned) => info!(job_id = %request.job_id, pruned, "pruned old result logs"),
            Err(e) => warn!(job_id = %request.job_id, error = %e, "failed to prune result logs"),
        }
    }
    Ok(summary)
}

async fn preview(env: &RunEnvironment, request: &GenerateRequest) -> Result<RunSummary, RunError> {
    let config = GenerateRequest {
        target_count: Some(1),
        ..request.clone()
    }
    .configuration(&env.settings)?;
    let scratch = RunStores::temporary(env.settings.lock_ttl_secs)?;
    let hooks = CompletionHandler::from_registry(&env.registry, &config, scratch.ledger.clone())?;
    let driver = GenerationDriver::new(
        Arc::new(LocalExecutor::preview(
            env.catalog.clone(),
            scratch.items.clone(),
        )),
        Arc::new(MemoryCursorStore::new()),
        scratch.locks.clone(),
        hooks,
        scratch.results.clone(),
    )
    .with_cancel_flag(env.cancel.clone());
    driver
        .run(
            &config,
            ProgressCursor::fresh(&request.job_id, new_run_nonce(), 0, 1),
        )
        .await
}
