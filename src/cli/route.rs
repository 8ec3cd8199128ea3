//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::parse::{
    Commands, GenerateCommands, ListCommands, MaintenanceArgs, RunArgs, TestCommands,
};
use crate::cli::presentation::{
    format_cursor_status, format_job_list_json, format_job_list_text, format_log_entries,
    format_maintenance_report, format_preview, format_run_summary_text, JobListEntry,
};
use crate::cli::command_name;
use crate::config::{BulkgenConfig, ConfigLoader};
use crate::cursor::{CursorStore, FinalStatus};
use crate::error::RunError;
use crate::generation::{
    run_generate, CancelFlag, CompletionHandler, GenerateRequest, GenerationDriver, HookRegistry,
    LocalExecutor, Outcome, RunEnvironment,
};
use crate::items::{ItemStatus, ItemStore};
use crate::job::JobCatalog;
use crate::maintenance::{BulkMaintenanceOperation, MaintenanceAction, MaintenanceRequest};
use crate::results::EntryKind;
use crate::storage::RunStores;
use crate::types::JobKind;
use crate::wire::WireHandler;

/// Runtime context for CLI execution: workspace, configuration and opened stores.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: BulkgenConfig,
    catalog: Arc<JobCatalog>,
    stores: RunStores,
    registry: HookRegistry,
    cancel: CancelFlag,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, RunError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        let (store_path, jobs_path) = config.system.storage.resolve_paths(&workspace_root);
        let catalog = JobCatalog::load_from_dir(&jobs_path)?;
        let stores = RunStores::open(&store_path, config.generation.lock_ttl_secs)?;
        debug!(store = %store_path.display(), jobs = %jobs_path.display(), "run context ready");

        Ok(Self {
            workspace_root,
            config,
            catalog: Arc::new(catalog),
            stores,
            registry: HookRegistry::with_builtins(),
            cancel: CancelFlag::new(),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, RunError> {
        info!(command = %command_name(command), "executing command");
        let result = self.execute_inner(command);
        self.stores.flush()?;
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, RunError> {
        match command {
            Commands::Generate { command } => match command {
                GenerateCommands::Content {
                    ids,
                    resume_index,
                    number_of_posts,
                    run,
                } => self.handle_generate(JobKind::Content, ids, *resume_index, *number_of_posts, run),
                GenerateCommands::Terms {
                    ids,
                    resume_index,
                    number_of_terms,
                    run,
                } => self.handle_generate(JobKind::Terms, ids, *resume_index, *number_of_terms, run),
            },
            Commands::Test { command } => match command {
                TestCommands::Content { id } => self.handle_test(JobKind::Content, id),
                TestCommands::Terms { id } => self.handle_test(JobKind::Terms, id),
            },
            Commands::List { command } => match command {
                ListCommands::Content { format } => self.handle_list(JobKind::Content, format),
                ListCommands::Terms { format } => self.handle_list(JobKind::Terms, format),
            },
            Commands::DeleteGeneratedTerms {
                id,
                exclude_term_ids,
                args,
            } => self.handle_maintenance(
                JobKind::Terms,
                MaintenanceAction::Delete,
                id,
                exclude_term_ids,
                args,
            ),
            Commands::TrashGeneratedContent {
                id,
                exclude_post_ids,
                args,
            } => self.handle_maintenance(
                JobKind::Content,
                MaintenanceAction::Trash,
                id,
                exclude_post_ids,
                args,
            ),
            Commands::DeleteGeneratedContent {
                id,
                exclude_post_ids,
                args,
            } => self.handle_maintenance(
                JobKind::Content,
                MaintenanceAction::Delete,
                id,
                exclude_post_ids,
                args,
            ),
            Commands::Status { id, format } => {
                let cursor = self.stores.cursors.load(id)?;
                format_cursor_status(id, cursor.as_ref(), format)
            }
            Commands::Cancel { id } => self.handle_cancel(id),
            Commands::Log {
                id,
                run,
                errors_only,
                format,
            } => self.handle_log(id, run.as_deref(), *errors_only, format),
            Commands::Invoke { request } => self.handle_invoke(request.as_deref()),
        }
    }

    fn environment(&self) -> RunEnvironment {
        RunEnvironment {
            catalog: self.catalog.clone(),
            stores: self.stores.clone(),
            registry: self.registry.clone(),
            settings: self.config.generation.clone(),
            remote: self.config.remote.clone(),
            keep_runs: self.config.results.keep_runs,
            cancel: self.cancel.clone(),
        }
    }

    /// Jobs run one after another; an aborted run stops the remaining ones.
    fn handle_generate(
        &self,
        kind: JobKind,
        ids: &str,
        resume_index: Option<u64>,
        target_count: Option<u64>,
        run: &RunArgs,
    ) -> Result<String, RunError> {
        let job_ids = parse_job_ids(ids)?;
        let env = self.environment();
        let mut outputs = Vec::with_capacity(job_ids.len());

        for (position, job_id) in job_ids.iter().enumerate() {
            let request = GenerateRequest {
                resume_index,
                target_count,
                step_size: run.step_size,
                stop_on_error: run.stop_on_error_override(),
                retry_pause_ms: run.retry_pause_ms,
                resume: run.resume,
                remote: run.remote.clone(),
                ..GenerateRequest::new(kind, job_id.as_str())
            };
            let summary = run_generate(&env, &request)?;
            outputs.push(format_run_summary_text(&summary, kind));
            if summary.status == FinalStatus::Aborted {
                return Err(RunError::Aborted {
                    job_id: summary.job_id.clone(),
                    reason: summary
                        .abort_reason
                        .clone()
                        .unwrap_or_else(|| "step failed".to_string()),
                    report: outputs.join("\n"),
                });
            }

            let remaining = job_ids.len() - position - 1;
            if self.cancel.is_cancelled() && remaining > 0 {
                outputs.push(format!("Interrupted; skipped {} remaining job(s).", remaining));
                break;
            }
        }
        Ok(outputs.join("\n"))
    }

    fn handle_test(&self, kind: JobKind, id: &str) -> Result<String, RunError> {
        let definition = self.catalog.get_or_error(id, kind)?;
        let request = GenerateRequest {
            dry_run: true,
            ..GenerateRequest::new(kind, id)
        };
        let summary = run_generate(&self.environment(), &request)?;
        Ok(format_preview(definition, &summary))
    }

    fn handle_list(&self, kind: JobKind, format: &str) -> Result<String, RunError> {
        let mut entries = Vec::new();
        for definition in self.catalog.list_by_kind(kind) {
            let last_run = self.stores.cursors.load(&definition.id)?.map(|cursor| {
                match cursor.final_status {
                    Some(status) => status.as_str().to_string(),
                    None => cursor.phase.as_str().to_string(),
                }
            });
            entries.push(JobListEntry {
                id: definition.id.clone(),
                title: definition.title.clone(),
                description: definition.description.clone(),
                rows: definition.total_rows(),
                generated: self
                    .stores
                    .items
                    .count_for_job(&definition.id, ItemStatus::Published)?,
                last_run,
            });
        }
        match format {
            "json" => format_job_list_json(kind, &entries),
            _ => Ok(format_job_list_text(kind, &entries)),
        }
    }

    fn handle_maintenance(
        &self,
        kind: JobKind,
        action: MaintenanceAction,
        id: &str,
        exclude_ids: &[u64],
        args: &MaintenanceArgs,
    ) -> Result<String, RunError> {
        self.catalog.get_or_error(id, kind)?;
        let request = MaintenanceRequest::new(id, action)
            .with_limit(args.limit)
            .excluding(exclude_ids.iter().copied())
            .dry_run(args.dry_run);

        if !args.dry_run && !args.yes {
            if !std::io::stdin().is_terminal() {
                return Err(RunError::InvalidState(format!(
                    "Refusing to {} items of job {} without --yes in a non-interactive session",
                    action.as_str(),
                    id
                )));
            }
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "{} up to {} generated {} item(s) of job '{}'?",
                    action.as_str(),
                    args.limit,
                    kind,
                    id
                ))
                .interact()
                .map_err(|e| RunError::ConfigError(format!("Failed to get user input: {}", e)))?;
            if !confirmed {
                return Ok("Maintenance cancelled".to_string());
            }
        }

        let operation = BulkMaintenanceOperation::new(self.stores.items.clone());
        let report = operation.run(&request)?;
        format_maintenance_report(&report, &args.format)
    }

    fn handle_cancel(&self, id: &str) -> Result<String, RunError> {
        if self.stores.cursors.mark_cancelled(id)? {
            Ok(format!(
                "Cancellation requested for job {}; the run stops after its current step.",
                id
            ))
        } else {
            Ok(format!("Job {} has no unfinished run.", id))
        }
    }

    fn handle_log(
        &self,
        id: &str,
        run: Option<&str>,
        errors_only: bool,
        format: &str,
    ) -> Result<String, RunError> {
        let nonce = match run {
            Some(nonce) => nonce.to_string(),
            None => match self.stores.results.latest_run(id)? {
                Some(nonce) => nonce,
                None => return Ok(format!("Job {} has no logged runs.", id)),
            },
        };
        let mut entries = self.stores.results.read_run(id, &nonce)?;
        if errors_only {
            entries.retain(|e| e.kind == EntryKind::Item && e.outcome == Outcome::Error);
        }
        format_log_entries(id, &nonce, &entries, format)
    }

    /// Serves one wire request against this workspace's stores.
    fn handle_invoke(&self, request: Option<&str>) -> Result<String, RunError> {
        let raw = match request {
            Some(raw) => raw.to_string(),
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| RunError::Wire(format!("Failed to read request: {}", e)))?;
                buf
            }
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(RunError::InvalidState(
                "Cannot serve a request from within an async runtime".to_string(),
            ));
        }
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| RunError::ConfigError(format!("Failed to create runtime: {}", e)))?;

        let hooks = CompletionHandler::from_settings(
            &self.registry,
            &self.config.generation,
            self.stores.ledger.clone(),
        )?;
        let driver = GenerationDriver::new(
            Arc::new(LocalExecutor::new(
                self.catalog.clone(),
                self.stores.items.clone(),
            )),
            self.stores.cursors.clone(),
            self.stores.locks.clone(),
            hooks,
            self.stores.results.clone(),
        );
        let handler = WireHandler::new(driver, self.catalog.clone(), self.config.generation.clone());
        Ok(rt.block_on(handler.handle_json(raw.trim())))
    }
}

fn parse_job_ids(ids: &str) -> Result<Vec<String>, RunError> {
    let job_ids: Vec<String> = ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if job_ids.is_empty() {
        return Err(RunError::InvalidJob("No job ids given".to_string()));
    }
    Ok(job_ids)
}
