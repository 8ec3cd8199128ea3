//! HTTP transport for the step protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::RemoteSettings;
use crate::error::RunError;
use crate::generation::executor::TransportError;
use crate::wire::client::StepTransport;
use crate::wire::message::StepRequest;

fn map_http_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::new(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        TransportError::new(format!("Connection error: {}", error))
    } else {
        TransportError::new(format!("HTTP error: {}", error))
    }
}

/// Posts each request as JSON to a single endpoint.
pub struct HttpStepTransport {
    client: Client,
    endpoint: String,
}

impl HttpStepTransport {
    pub fn new(endpoint: impl Into<String>, settings: &RemoteSettings) -> Result<Self, RunError> {
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| RunError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StepTransport for HttpStepTransport {
    async fn send(&self, request: &StepRequest) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_http_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_http_error)?;
        if !status.is_success() {
            let detail = body.trim();
            return Err(TransportError::new(if detail.is_empty() {
                format!("Request failed with status {}", status)
            } else {
                format!("Request failed with status {}: {}", status, detail)
            }));
        }
        Ok(body)
    }
}
