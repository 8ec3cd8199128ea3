//! Client side of the step protocol: a remote executor and lifecycle observer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cursor::{FinalStatus, ProgressCursor};
use crate::error::RunError;
use crate::generation::driver::CancelFlag;
use crate::generation::executor::{StepSlice, TransportError, WorkUnitExecutor};
use crate::generation::hooks::LifecycleObserver;
use crate::generation::result::GenerationResult;
use crate::job::JobConfiguration;
use crate::wire::message::{StepAction, StepData, StepRequest, StepResponse};

/// Carries one encoded request to the server and returns the raw reply.
#[async_trait]
pub trait StepTransport: Send + Sync {
    async fn send(&self, request: &StepRequest) -> Result<String, TransportError>;
}

fn decode(raw: &str) -> Result<StepResponse, TransportError> {
    serde_json::from_str(raw)
        .map_err(|e| TransportError::new(format!("Malformed response from server: {}", e)))
}

/// Executes steps on a remote server.
pub struct WireExecutor {
    transport: Arc<dyn StepTransport>,
    stop_on_error: bool,
    retry_pause_ms: Option<u64>,
    cancel: Option<CancelFlag>,
}

impl WireExecutor {
    pub fn new(transport: Arc<dyn StepTransport>, config: &JobConfiguration) -> Self {
        Self {
            transport,
            stop_on_error: config.stop_on_error,
            retry_pause_ms: Some(config.retry_pause_ms),
            cancel: None,
        }
    }

    /// Flag raised when the server reports the run is no longer stepping.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[async_trait]
impl WorkUnitExecutor for WireExecutor {
    async fn next(&self, slice: &StepSlice) -> Result<Vec<GenerationResult>, TransportError> {
        let request = StepRequest {
            current_offset: slice.offset,
            step_size: slice.step_size,
            target_count: slice.target_count,
            resume_offset: slice.offset,
            last_marker: slice.last_marker.clone(),
            stop_on_error: self.stop_on_error,
            retry_pause_ms: self.retry_pause_ms,
            ..StepRequest::new(StepAction::Step, &slice.job_id, &slice.nonce)
        };
        let response = decode(&self.transport.send(&request).await?)?;

        if response.success {
            return match response.data {
                StepData::Results(results) => Ok(results),
                StepData::Message(message) => Err(TransportError::new(message)),
            };
        }

        if response.status.is_some() {
            tracing::info!(
                job_id = %slice.job_id,
                status = response.status.as_deref().unwrap_or_default(),
                "server stopped the run"
            );
            if let Some(cancel) = &self.cancel {
                cancel.cancel();
            }
        }
        let messages = response.messages();
        if messages.is_empty() {
            return Err(TransportError::unknown());
        }
        Ok(messages.into_iter().map(GenerationResult::error).collect())
    }
}

/// Opens and closes the server-side run from the local lifecycle.
pub struct RemoteLifecycle {
    transport: Arc<dyn StepTransport>,
}

impl RemoteLifecycle {
    pub fn new(transport: Arc<dyn StepTransport>) -> Self {
        Self { transport }
    }

    async fn exchange(&self, request: StepRequest) -> Result<StepResponse, RunError> {
        let raw = self
            .transport
            .send(&request)
            .await
            .map_err(|e| RunError::Transport(e.message_or_default()))?;
        let response = decode(&raw).map_err(|e| RunError::Wire(e.message_or_default()))?;
        if !response.success {
            return Err(RunError::Wire(response.messages().join("; ")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LifecycleObserver for RemoteLifecycle {
    fn name(&self) -> &str {
        "remote"
    }

    async fn on_start(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
    ) -> Result<(), RunError> {
        let request = StepRequest {
            current_offset: cursor.resume_offset,
            step_size: config.step_size,
            target_count: cursor.target_count,
            resume_offset: cursor.resume_offset,
            last_marker: cursor.last_marker.clone(),
            stop_on_error: config.stop_on_error,
            retry_pause_ms: Some(config.retry_pause_ms),
            ..StepRequest::new(StepAction::Start, &config.job_id, &cursor.nonce)
        };
        self.exchange(request).await.map(|_| ())
    }

    async fn on_finish(
        &self,
        config: &JobConfiguration,
        cursor: &ProgressCursor,
        _status: FinalStatus,
    ) -> Result<(), RunError> {
        let request = StepRequest {
            current_offset: cursor.resume_offset,
            step_size: config.step_size,
            target_count: cursor.target_count,
            resume_offset: cursor.resume_offset,
            ..StepRequest::new(StepAction::Finish, &config.job_id, &cursor.nonce)
        };
        let response = self.exchange(request).await?;
        tracing::info!(
            job_id = %config.job_id,
            remote_status = response.status.as_deref().unwrap_or("unknown"),
            "remote run finished"
        );
        Ok(())
    }
}
