//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across the integration test
//! files.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use cadence::adapters::execution::MockExecutionBackend;
use cadence::adapters::memory::InMemoryTaskRepository;
use cadence::domain::models::{ServerMessage, StreamEvent};
use cadence::domain::ports::{ExecutionBackend, TaskRepository};
use cadence::services::{ExecutionBridge, RetryPolicy, StreamManager, TaskDispatcher, TaskStore};

/// Dispatcher over an in-memory store and the mock backend.
#[allow(dead_code)]
pub fn mock_dispatcher(delay_ms: u64, streaming: bool) -> Arc<TaskDispatcher> {
    dispatcher_with(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(MockExecutionBackend::new(Duration::from_millis(delay_ms))),
        streaming,
    )
}

#[allow(dead_code)]
pub fn dispatcher_with(
    repo: Arc<dyn TaskRepository>,
    backend: Arc<dyn ExecutionBackend>,
    streaming: bool,
) -> Arc<TaskDispatcher> {
    Arc::new(TaskDispatcher::new(
        Arc::new(TaskStore::new(repo)),
        Arc::new(ExecutionBridge::new(backend, RetryPolicy::new(0, 1, 1))),
        Arc::new(StreamManager::new(64)),
        streaming,
    ))
}

/// Every stream event already queued for a connection, greeting skipped.
#[allow(dead_code)]
pub fn drain_events(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let ServerMessage::Event { data, .. } = message {
            events.push(data);
        }
    }
    events
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 20ms until it returns true or the timeout is
/// reached.
#[allow(dead_code)]
pub async fn wait_for<F, Fut>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    false
}
