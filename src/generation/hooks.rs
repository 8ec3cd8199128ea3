//! Lifecycle hooks: start and finish fire once per run-nonce.
//!
//! A hook is claimed in the [`HookLedger`] before its observer runs. A duplicate
//! call for the same job id and nonce finds the claim and does nothing. A process
//! that dies between claim and invocation never re-runs the hook.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sled::{Db, Tree};
use tracing::{debug, info, warn};

use crate::cursor::{FinalStatus, ProgressCursor};
use crate::error::{RunError, StorageError};
use crate::job::{GenerationSettings, JobConfiguration};
use crate::types::now_millis;

const TREE_HOOK_LEDGER: &str = "hook_ledger";

/// Hook id that disables a hook point.
pub const NO_HOOK: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Start,
    Finish,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::Start => "start",
            HookPoint::Finish => "finish",
        }
    }
}

pub trait HookLedger: Send + Sync {
    /// Record that `point` fired for the run. Returns false if it already had.
    fn claim(&self, job_id: &str, nonce: &str, point: HookPoint) -> Result<bool, StorageError>;
}

fn ledger_key(job_id: &str, nonce: &str, point: HookPoint) -> String {
    format!("{}:{}:{}", job_id, nonce, point.as_str())
}

#[derive(Clone)]
pub struct SledHookLedger {
    db: Db,
    claims: Tree,
}

impl SledHookLedger {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let claims = db
            .open_tree(TREE_HOOK_LEDGER)
            .map_err(StorageError::from_sled)?;
        Ok(Self { db, claims })
    }
}

impl HookLedger for SledHookLedger {
    fn claim(&self, job_id: &str, nonce: &str, point: HookPoint) -> Result<bool, StorageError> {
        let key = ledger_key(job_id, nonce, point);
        let stamp = now_millis().to_be_bytes();
        let swapped = self
            .claims
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(&stamp[..]))
            .map_err(StorageError::from_sled)?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.db.flush().map_err(StorageError::from_sled)?;
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryHookLedger {
    claims: Mutex<HashSet<String>>,
}

impl MemoryHookLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HookLedger for MemoryHookLedger {
    fn claim(&self, job_id: &str, nonce: &str, point: HookPoint) -> Result<bool, StorageError> {
        Ok(self.claims.lock().insert(ledger_key(job_id, nonce, point)))
    }
}

/// Notified at lifecycle points of a run, in registration order.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    fn name(&self) -> &str;

    async fn on_start(
        &self,
        _config: &JobConfiguration,
        _cursor: &ProgressCursor,
    ) -> Result<(), RunError> {
        Ok(())
    }

    async fn before_step(
        &self,
        _config: &JobConfiguration,
        _cursor: &ProgressCursor,
    ) -> Result<(), RunError> {
        Ok(())
    }

    async fn on_finish(
        &self,
        _config: &JobConfiguration,
        _cursor: &ProgressCursor,
        _status: FinalStatus,
    ) -> Result<(), RunError> {
        Ok(())
    }
}

/// Built-in `log` hook.
pub struct LogHook;

#[async_trait]
impl LifecycleObserver for LogHook {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_start(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
    ) -> Result<(), RunError> {
        info!(
            job_id = %config.job_id,
            nonce = %cursor.nonce,
            start_offset = cursor.run_start_offset,
            target = cursor.target_count,
            "generation started"
        );
        Ok(())
    }

    async fn on_finish(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
        status: FinalStatus,
    ) -> Result<(), RunError> {
        info!(
            job_id = %config.job_id,
            nonce = %cursor.nonce,
            status = status.as_str(),
            processed = cursor.processed_count,
            resume_offset = cursor.resume_offset,
            "generation finished"
        );
        Ok(())
    }
}

/// Maps hook ids to observers. Resolved once when a handler is built.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Arc<dyn LifecycleObserver>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("log", Arc::new(LogHook));
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, hook: Arc<dyn LifecycleObserver>) {
        self.hooks.insert(id.into(), hook);
    }

    /// `none` resolves to no hook; unknown ids are an error.
    pub fn resolve(&self, id: &str) -> Result<Option<Arc<dyn LifecycleObserver>>, RunError> {
        if id == NO_HOOK {
            return Ok(None);
        }
        self.hooks
            .get(id)
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                let known: Vec<&str> = std::iter::once(NO_HOOK).chain(self.ids()).collect();
                RunError::HookNotFound(format!("{} (known hooks: {})", id, known.join(", ")))
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

pub struct CompletionHandler {
    start_hook: Option<Arc<dyn LifecycleObserver>>,
    finish_hook: Option<Arc<dyn LifecycleObserver>>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    ledger: Arc<dyn HookLedger>,
}

impl CompletionHandler {
    pub fn new(ledger: Arc<dyn HookLedger>) -> Self {
        Self {
            start_hook: None,
            finish_hook: None,
            observers: Vec::new(),
            ledger,
        }
    }

    pub fn from_registry(
        registry: &HookRegistry,
        config: &JobConfiguration,
        ledger: Arc<dyn HookLedger>,
    ) -> Result<Self, RunError> {
        Ok(Self {
            start_hook: registry.resolve(&config.start_hook_id)?,
            finish_hook: registry.resolve(&config.finish_hook_id)?,
            observers: Vec::new(),
            ledger,
        })
    }

    /// Handler for adapters serving many jobs with the configured default hooks.
    pub fn from_settings(
        registry: &HookRegistry,
        settings: &GenerationSettings,
        ledger: Arc<dyn HookLedger>,
    ) -> Result<Self, RunError> {
        Ok(Self {
            start_hook: registry.resolve(&settings.start_hook)?,
            finish_hook: registry.resolve(&settings.finish_hook)?,
            observers: Vec::new(),
            ledger,
        })
    }

    /// Observers run after the configured hook at each point.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Fire the start hook. Returns false if this run already fired it.
    pub async fn on_start(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
    ) -> Result<bool, RunError> {
        if !self
            .ledger
            .claim(&config.job_id, &cursor.nonce, HookPoint::Start)?
        {
            debug!(job_id = %config.job_id, nonce = %cursor.nonce, "start hook already fired");
            return Ok(false);
        }
        for observer in self.start_hook.iter().chain(self.observers.iter()) {
            if let Err(e) = observer.on_start(config, cursor).await {
                warn!(observer = observer.name(), error = %e, "start observer failed");
            }
        }
        Ok(true)
    }

    pub async fn before_step(&self, config: &JobConfiguration, cursor: &ProgressCursor) {
        for observer in &self.observers {
            if let Err(e) = observer.before_step(config, cursor).await {
                warn!(observer = observer.name(), error = %e, "before-step observer failed");
            }
        }
    }

    /// Fire the finish hook. Returns false if this run already fired it.
    pub async fn on_finish(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
        status: FinalStatus,
    ) -> Result<bool, RunError> {
        if !self
            .ledger
            .claim(&config.job_id, &cursor.nonce, HookPoint::Finish)?
        {
            debug!(job_id = %config.job_id, nonce = %cursor.nonce, "finish hook already fired");
            return Ok(false);
        }
        for observer in self.finish_hook.iter().chain(self.observers.iter()) {
            if let Err(e) = observer.on_finish(config, cursor, status).await {
                warn!(observer = observer.name(), error = %e, "finish observer failed");
            }
        }
        Ok(true)
    }
}
