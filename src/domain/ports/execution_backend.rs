//! Execution backend port - interface for remote task execution.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::models::{ExecutionRequest, ExecutionResult, StreamEvent};

/// Failures talking to an execution backend.
///
/// A backend that answered and reported a failed task is not an error; it is
/// an [`ExecutionResult`] with `success == false`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Could not reach the backend or the connection dropped before any data
    #[error("Connection error: {0}")]
    Transport(String),

    /// The request exceeded its time bound
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// The stream broke after events were already delivered
    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    /// The backend sent something that is not part of the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ExecutionError {
    /// Transient errors are safe to retry: nothing reached the caller yet.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Trait for execution backend implementations (remote HTTP service, mock).
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Backend type name.
    fn name(&self) -> &'static str;

    /// Probe the backend. Never fails; any problem is reported as `false`.
    async fn health_check(&self) -> bool;

    /// Run a task to completion.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutionError>;

    /// Run a task, sending progress events in arrival order before returning.
    async fn execute_streaming(
        &self,
        request: &ExecutionRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<ExecutionResult, ExecutionError>;
}
