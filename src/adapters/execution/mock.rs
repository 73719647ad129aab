//! Simulated execution backend used when no remote backend is configured.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::models::{ExecutionRequest, ExecutionResult, StreamEvent, StreamEventKind};
use crate::domain::ports::{ExecutionBackend, ExecutionError};

/// Canned behaviour of the mock backend.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Succeed with output echoing the task description
    Echo,
    /// Report a backend failure with the given output
    Failure(String),
    /// Fail before reaching the backend
    Unreachable(String),
}

/// Mock backend: fixed delay, predictable progress events, echoing result.
#[derive(Debug, Clone)]
pub struct MockExecutionBackend {
    delay: Duration,
    response: MockResponse,
}

impl Default for MockExecutionBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

impl MockExecutionBackend {
    /// Echoing backend that takes `delay` per execution.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            response: MockResponse::Echo,
        }
    }

    /// Replace the canned response.
    pub fn with_response(mut self, response: MockResponse) -> Self {
        self.response = response;
        self
    }

    fn result_for(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        match &self.response {
            MockResponse::Echo => Ok(ExecutionResult::success(format!(
                "Mock execution completed: {}",
                request.task
            ))),
            MockResponse::Failure(output) => Ok(ExecutionResult::failure(output.clone())),
            MockResponse::Unreachable(message) => Err(ExecutionError::Transport(message.clone())),
        }
    }

    fn progress(request: &ExecutionRequest) -> Vec<StreamEventKind> {
        let workdir = request.repo_path.clone().unwrap_or_else(|| ".".to_string());
        vec![
            StreamEventKind::Output {
                content: format!("Analyzing task: {}", request.task),
            },
            StreamEventKind::ToolUse {
                tool: "read_file".to_string(),
                input: Some(serde_json::json!({ "path": workdir })),
            },
            StreamEventKind::FileEdit {
                path: "src/index.ts".to_string(),
                summary: Some(format!("Applied changes for: {}", request.task)),
            },
            StreamEventKind::CommandRun {
                command: "npm test".to_string(),
                exit_code: Some(0),
            },
            StreamEventKind::Output {
                content: "All checks passed".to_string(),
            },
        ]
    }
}

#[async_trait]
impl ExecutionBackend for MockExecutionBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        let delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX);
        debug!(task_id = %request.task_id, delay_ms, "mock execution");
        tokio::time::sleep(self.delay).await;
        self.result_for(request)
    }

    async fn execute_streaming(
        &self,
        request: &ExecutionRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<ExecutionResult, ExecutionError> {
        if let MockResponse::Unreachable(message) = &self.response {
            return Err(ExecutionError::Transport(message.clone()));
        }

        let steps = Self::progress(request);
        let step_delay = self.delay / u32::try_from(steps.len()).unwrap_or(1);

        for kind in steps {
            tokio::time::sleep(step_delay).await;
            if events.send(StreamEvent::new(request.task_id, kind)).await.is_err() {
                debug!(task_id = %request.task_id, "event receiver dropped");
            }
        }

        self.result_for(request)
    }
}
