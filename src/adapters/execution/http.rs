//! Remote execution backend spoken to over HTTP.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client as ReqwestClient, Response};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::sse::{BackendFrame, SseFrameStream};
use crate::domain::models::{ExecutionConfig, ExecutionRequest, ExecutionResult, StreamEvent};
use crate::domain::ports::{ExecutionBackend, ExecutionError};

/// HTTP client for the remote coding-agent service.
///
/// - `GET {endpoint}/health` with the short health timeout
/// - `POST {endpoint}/task` with a bearer credential and the execution timeout
/// - `POST {endpoint}/task/stream` answering with server-sent events
///
/// Each call is a single attempt; retrying is up to the caller.
pub struct HttpExecutionBackend {
    http_client: ReqwestClient,
    endpoint: String,
    api_key: String,
    health_timeout: Duration,
    execution_timeout_secs: u64,
}

impl HttpExecutionBackend {
    /// Backend for `endpoint`, authenticating with `api_key` as a bearer token.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        config: &ExecutionConfig,
    ) -> Result<Self, ExecutionError> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.execution_timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ExecutionError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
            execution_timeout_secs: config.execution_timeout_secs,
        })
    }

    /// Base URL without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: &reqwest::Error) -> ExecutionError {
        if err.is_timeout() {
            ExecutionError::Timeout(self.execution_timeout_secs)
        } else {
            ExecutionError::Transport(err.to_string())
        }
    }

    async fn post(&self, path: &str, request: &ExecutionRequest, accept: &str) -> Result<Response, ExecutionError> {
        self.http_client
            .post(format!("{}{path}", self.endpoint))
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, accept)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(&e))
    }

    /// A non-2xx answer is a backend-reported failure carrying the body.
    async fn rejected(response: Response) -> ExecutionResult {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "execution backend rejected task");
        if body.trim().is_empty() {
            ExecutionResult::failure(format!("Execution backend returned {status}"))
        } else {
            ExecutionResult::failure(body)
        }
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/health", self.endpoint))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "health check failed");
                false
            }
        }
    }

    #[instrument(skip(self, request), fields(task_id = %request.task_id))]
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        let response = self.post("/task", request, "application/json").await?;
        if !response.status().is_success() {
            return Ok(Self::rejected(response).await);
        }

        response
            .json::<ExecutionResult>()
            .await
            .map_err(|e| ExecutionError::Protocol(format!("invalid result body: {e}")))
    }

    #[instrument(skip(self, request, events), fields(task_id = %request.task_id))]
    async fn execute_streaming(
        &self,
        request: &ExecutionRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let response = self.post("/task/stream", request, "text/event-stream").await?;
        if !response.status().is_success() {
            return Ok(Self::rejected(response).await);
        }

        let mut frames = SseFrameStream::new(response.bytes_stream());
        let mut forwarded = 0_usize;

        while let Some(frame) = frames.next().await {
            match frame? {
                BackendFrame::Event { event } => {
                    forwarded += 1;
                    if events.send(StreamEvent::new(request.task_id, event)).await.is_err() {
                        debug!("event receiver dropped, continuing without forwarding");
                    }
                }
                BackendFrame::Result(result) => {
                    debug!(events = forwarded, success = result.success, "stream finished");
                    return Ok(result);
                }
            }
        }

        let message = "stream ended without a result frame".to_string();
        Err(if forwarded == 0 {
            ExecutionError::Transport(message)
        } else {
            ExecutionError::Interrupted(message)
        })
    }
}
