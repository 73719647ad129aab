//! Execution bridge: the single entry point for running a task on a backend.
//!
//! Transport failures are retried with backoff; everything that still fails is
//! folded into an unsuccessful [`ExecutionResult`] so callers never see an error.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::retry::RetryPolicy;
use crate::adapters::execution::{HttpExecutionBackend, MockExecutionBackend};
use crate::domain::models::{ExecutionConfig, ExecutionRequest, ExecutionResult, StreamEvent, Task};
use crate::domain::ports::{ExecutionBackend, ExecutionError};

/// Runs tasks on the configured backend.
///
/// Transient backend errors are retried per the retry policy; whatever is left
/// is turned into a failed [`ExecutionResult`] so callers always get a result.
pub struct ExecutionBridge {
    backend: Arc<dyn ExecutionBackend>,
    retry_policy: RetryPolicy,
}

impl ExecutionBridge {
    /// Bridge over `backend` with the given retry policy.
    pub fn new(backend: Arc<dyn ExecutionBackend>, retry_policy: RetryPolicy) -> Self {
        Self { backend, retry_policy }
    }

    /// Remote backend when both endpoint and credential are configured, mock otherwise.
    pub fn from_config(config: &ExecutionConfig, retry_policy: RetryPolicy) -> Result<Self, ExecutionError> {
        let backend: Arc<dyn ExecutionBackend> = match config.remote() {
            Some((endpoint, api_key)) => {
                info!(endpoint, "using remote execution backend");
                Arc::new(HttpExecutionBackend::new(endpoint, api_key, config)?)
            }
            None => {
                info!(delay_ms = config.mock_delay_ms, "no execution endpoint configured, using mock backend");
                Arc::new(MockExecutionBackend::new(Duration::from_millis(config.mock_delay_ms)))
            }
        };
        Ok(Self::new(backend, retry_policy))
    }

    /// `mock` or `http`.
    pub fn mode(&self) -> &'static str {
        self.backend.name()
    }

    /// Whether the backend answers its health check.
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    /// Run a task and wait for its result.
    #[instrument(skip(self, task), fields(task_id = %task.id, mode = self.mode()))]
    pub async fn execute(&self, task: &Task) -> ExecutionResult {
        let request = ExecutionRequest::from(task);
        let backend = &self.backend;
        let request = &request;

        let outcome = self
            .retry_policy
            .execute_if(|| backend.execute(request), ExecutionError::is_transient)
            .await;

        Self::settle(outcome)
    }

    /// Like [`execute`](Self::execute), forwarding progress events to `events`
    /// in arrival order before the result is returned.
    ///
    /// Only failures that happened before any event was produced are retried,
    /// so a retry never repeats events.
    #[instrument(skip(self, task, events), fields(task_id = %task.id, mode = self.mode()))]
    pub async fn execute_streaming(&self, task: &Task, events: mpsc::Sender<StreamEvent>) -> ExecutionResult {
        let request = ExecutionRequest::from(task);
        let backend = &self.backend;
        let request = &request;

        let outcome = self
            .retry_policy
            .execute_if(
                move || {
                    let events = events.clone();
                    async move { backend.execute_streaming(request, events).await }
                },
                ExecutionError::is_transient,
            )
            .await;

        Self::settle(outcome)
    }

    fn settle(outcome: Result<ExecutionResult, ExecutionError>) -> ExecutionResult {
        match outcome {
            Ok(result) => {
                info!(success = result.success, "execution finished");
                result
            }
            Err(err) => {
                warn!(error = %err, "execution failed");
                ExecutionResult::failure(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::execution::MockResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyBackend {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> ExecutionError,
    }

    #[async_trait]
    impl ExecutionBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn health_check(&self) -> bool {
            false
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err((self.error)());
            }
            Ok(ExecutionResult::success(request.task.clone()))
        }

        async fn execute_streaming(
            &self,
            request: &ExecutionRequest,
            _events: mpsc::Sender<StreamEvent>,
        ) -> Result<ExecutionResult, ExecutionError> {
            self.execute(request).await
        }
    }

    fn flaky(failures: u32, error: fn() -> ExecutionError) -> Arc<FlakyBackend> {
        Arc::new(FlakyBackend {
            calls: AtomicU32::new(0),
            failures,
            error,
        })
    }

    #[test]
    fn test_mode_selection() {
        let mock = ExecutionBridge::from_config(&ExecutionConfig::default(), RetryPolicy::default()).unwrap();
        assert_eq!(mock.mode(), "mock");

        let half = ExecutionConfig {
            endpoint: Some("https://agent.example.com".into()),
            ..ExecutionConfig::default()
        };
        assert_eq!(ExecutionBridge::from_config(&half, RetryPolicy::default()).unwrap().mode(), "mock");

        let remote = ExecutionConfig {
            endpoint: Some("https://agent.example.com".into()),
            api_key: Some("key".into()),
            ..ExecutionConfig::default()
        };
        assert_eq!(ExecutionBridge::from_config(&remote, RetryPolicy::default()).unwrap().mode(), "http");
    }

    #[tokio::test]
    async fn test_mock_mode_execute_and_stream() {
        let bridge = ExecutionBridge::new(
            Arc::new(MockExecutionBackend::new(Duration::from_millis(5))),
            RetryPolicy::new(0, 1, 1),
        );
        let task = Task::new("fix login bug");

        let result = bridge.execute(&task).await;
        assert!(result.success);
        assert!(result.output.contains("fix login bug"));

        let (tx, mut rx) = mpsc::channel(16);
        let result = bridge.execute_streaming(&task, tx).await;
        assert!(result.success);
        assert_eq!(rx.recv().await.unwrap().event_type(), "output");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let backend = flaky(2, || ExecutionError::Transport("refused".into()));
        let bridge = ExecutionBridge::new(backend.clone(), RetryPolicy::new(2, 1, 5));

        let result = bridge.execute(&Task::new("retry me")).await;
        assert!(result.success);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_failed_result() {
        let backend = flaky(10, || ExecutionError::Timeout(600));
        let bridge = ExecutionBridge::new(backend.clone(), RetryPolicy::new(2, 1, 5));

        let (tx, _rx) = mpsc::channel(4);
        let result = bridge.execute_streaming(&Task::new("never"), tx).await;
        assert!(!result.success);
        assert!(result.output.contains("Timed out"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_interrupted_stream_is_not_retried() {
        let backend = flaky(10, || ExecutionError::Interrupted("reset".into()));
        let bridge = ExecutionBridge::new(backend.clone(), RetryPolicy::new(3, 1, 5));

        let result = bridge.execute(&Task::new("once")).await;
        assert!(!result.success);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_reported_failure_is_not_retried() {
        let backend = MockExecutionBackend::new(Duration::ZERO)
            .with_response(MockResponse::Failure("lint errors".into()));
        let bridge = ExecutionBridge::new(Arc::new(backend), RetryPolicy::new(3, 1, 5));

        let result = bridge.execute(&Task::new("lint")).await;
        assert!(!result.success);
        assert_eq!(result.output, "lint errors");
    }
}
