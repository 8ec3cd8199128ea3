//! Server side of the step protocol: one request, one driver transition.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cursor::{DriverPhase, ProgressCursor};
use crate::error::RunError;
use crate::generation::driver::{GenerationDriver, StepDisposition};
use crate::job::{GenerationSettings, JobCatalog, JobConfiguration};
use crate::wire::message::{StepAction, StepRequest, StepResponse};

pub struct WireHandler {
    driver: GenerationDriver,
    catalog: Arc<JobCatalog>,
    settings: GenerationSettings,
}

impl WireHandler {
    pub fn new(
        driver: GenerationDriver,
        catalog: Arc<JobCatalog>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            driver,
            catalog,
            settings,
        }
    }

    /// Decode, handle and encode one request. Never fails: every problem
    /// becomes a `success: false` response.
    pub async fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<StepRequest>(raw) {
            Ok(request) => self.handle(&request).await,
            Err(e) => StepResponse::failure(format!("Malformed request: {}", e)),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"data":"Failed to encode response: {}"}}"#, e)
        })
    }

    pub async fn handle(&self, request: &StepRequest) -> StepResponse {
        let result = match request.action {
            StepAction::Start => self.start(request).await,
            StepAction::Step => self.step(request).await,
            StepAction::Finish => self.finish(request).await,
        };
        result.unwrap_or_else(|e| {
            warn!(job_id = %request.job_id, action = ?request.action, error = %e, "wire request failed");
            StepResponse::failure(e.to_string())
        })
    }

    fn configuration(&self, request: &StepRequest) -> Result<JobConfiguration, RunError> {
        let definition = self
            .catalog
            .get(&request.job_id)
            .ok_or_else(|| RunError::JobNotFound(request.job_id.clone()))?;
        let mut builder = JobConfiguration::builder_with(&request.job_id, &self.settings)
            .kind(definition.kind)
            .target_count(request.target_count)
            .stop_on_error(request.stop_on_error);
        if request.step_size > 0 {
            builder = builder.step_size(request.step_size);
        }
        if let Some(retry_pause_ms) = request.retry_pause_ms {
            builder = builder.retry_pause_ms(retry_pause_ms);
        }
        Ok(builder
            .build()?
            .resolve_target(definition.remaining_estimate(request.resume_offset)))
    }

    /// Cursor of the run named by the request; any other run is an error.
    fn cursor_for(&self, request: &StepRequest) -> Result<ProgressCursor, RunError> {
        let cursor = self
            .driver
            .cursors()
            .load(&request.job_id)?
            .ok_or_else(|| {
                RunError::Wire(format!("No run in progress for job {}", request.job_id))
            })?;
        if cursor.nonce != request.nonce {
            return Err(RunError::Wire(format!(
                "Unknown run nonce {} for job {}",
                request.nonce, request.job_id
            )));
        }
        Ok(cursor)
    }

    async fn start(&self, request: &StepRequest) -> Result<StepResponse, RunError> {
        let config = self.configuration(request)?;
        let mut cursor = match self.driver.cursors().load(&request.job_id)? {
            Some(existing) if existing.nonce == request.nonce => {
                debug!(job_id = %request.job_id, nonce = %request.nonce, "duplicate start");
                existing
            }
            _ => ProgressCursor::fresh(
                &request.job_id,
                &request.nonce,
                request.resume_offset,
                config.target_count,
            ),
        };
        self.driver.begin(&config, &mut cursor).await?;
        Ok(StepResponse::message(format!(
            "Run {} of job {} is {}",
            cursor.nonce,
            cursor.job_id,
            cursor.phase.as_str()
        )))
    }

    async fn step(&self, request: &StepRequest) -> Result<StepResponse, RunError> {
        let mut cursor = self.cursor_for(request)?;
        if request.current_offset != cursor.resume_offset {
            return Err(RunError::Wire(format!(
                "Offset mismatch for job {}: expected {}, got {}",
                request.job_id, cursor.resume_offset, request.current_offset
            )));
        }
        let mut config = self.configuration(request)?;
        config.target_count = cursor.target_count;

        let report = self.driver.step(&config, &mut cursor).await?;
        Ok(match report.disposition {
            StepDisposition::Advanced { .. } => StepResponse::results(report.results),
            StepDisposition::Retry { errors, .. } => StepResponse::failure(errors.join("\n")),
            StepDisposition::Aborted { reason } => {
                StepResponse::failure(reason).with_status(cursor.terminal_status().as_str())
            }
            StepDisposition::Finalizing => {
                let status = cursor.terminal_status();
                StepResponse::failure(format!("Run is {}", phase_label(cursor.phase)))
                    .with_status(status.as_str())
            }
        })
    }

    async fn finish(&self, request: &StepRequest) -> Result<StepResponse, RunError> {
        let mut cursor = self.cursor_for(request)?;
        let mut config = self.configuration(request)?;
        config.target_count = cursor.target_count;
        let status = self.driver.finish(&config, &mut cursor).await?;
        Ok(StepResponse::results(Vec::new()).with_status(status.as_str()))
    }
}

fn phase_label(phase: DriverPhase) -> &'static str {
    match phase {
        DriverPhase::Completing => "complete",
        DriverPhase::Cancelling => "cancelled",
        other => other.as_str(),
    }
}
