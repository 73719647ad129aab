//! Detached task execution.
//!
//! Submitting a task returns as soon as it is recorded; the execution runs as
//! its own tokio task and always ends in a task transition, even when the
//! execution panics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::execution_bridge::ExecutionBridge;
use super::stream_manager::StreamManager;
use super::task_store::TaskStore;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionResult, PrState, StreamEvent, Task, TaskStatus};

/// Buffer between the backend and the stream manager for one execution.
const EVENT_BUFFER: usize = 64;

/// Everything one execution needs, cloned into its spawned task.
#[derive(Clone)]
struct ExecutionContext {
    store: Arc<TaskStore>,
    bridge: Arc<ExecutionBridge>,
    streams: Arc<StreamManager>,
    streaming: bool,
}

impl ExecutionContext {
    async fn run(self, task: Task) {
        let task_id = task.id;
        let body = tokio::spawn(self.clone().execute(task));

        if let Err(join_err) = body.await {
            let message = if join_err.is_panic() {
                "Execution panicked".to_string()
            } else {
                format!("Execution aborted: {join_err}")
            };
            error!(task_id = %task_id, error = %join_err, "execution did not finish");
            self.finish(task_id, ExecutionResult::failure(message)).await;
        }
    }

    async fn execute(self, task: Task) {
        let task = match self.store.mark_running(task.id).await {
            Ok(task) => task,
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "task not started");
                return;
            }
        };

        self.streams
            .publish(task.id, &StreamEvent::task_started(task.id, &task.description))
            .await;

        let result = if self.streaming {
            let (tx, mut rx) = mpsc::channel::<StreamEvent>(EVENT_BUFFER);
            let streams = Arc::clone(&self.streams);
            let forwarder = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    streams.publish(event.task_id, &event).await;
                }
            });

            let result = self.bridge.execute_streaming(&task, tx).await;
            if let Err(err) = forwarder.await {
                warn!(task_id = %task.id, error = %err, "event forwarder failed");
            }
            result
        } else {
            self.bridge.execute(&task).await
        };

        self.finish(task.id, result).await;
    }

    /// Record the outcome, then announce what was recorded.
    ///
    /// A result the store refuses fails the task instead, so the execution
    /// still ends in a terminal state. Late results for cancelled tasks are
    /// dropped without any event.
    async fn finish(&self, task_id: Uuid, result: ExecutionResult) {
        let task = match self.record(task_id, &result).await {
            Ok(task) => task,
            Err(err) if is_cancelled(&err) => {
                info!(task_id = %task_id, "execution finished after cancellation, result discarded");
                return;
            }
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "could not record execution result, failing task");
                match self.store.fail(task_id, format!("Could not record execution result: {err}")).await {
                    Ok(task) => task,
                    Err(err) if is_cancelled(&err) => return,
                    Err(err) => {
                        error!(task_id = %task_id, error = %err, "could not fail task");
                        return;
                    }
                }
            }
        };
        info!(task_id = %task_id, status = %task.status, "execution recorded");

        if task.status == TaskStatus::Failed {
            let message = task.error.clone().unwrap_or_default();
            self.streams
                .publish(task_id, &StreamEvent::error(task_id, message.clone(), false))
                .await;
            self.streams
                .publish(task_id, &StreamEvent::task_completed(task_id, false, message))
                .await;
        } else {
            let output = task.output.unwrap_or_default();
            self.streams
                .publish(task_id, &StreamEvent::task_completed(task_id, true, output))
                .await;
        }
    }

    async fn record(&self, task_id: Uuid, result: &ExecutionResult) -> DomainResult<Task> {
        if !result.success {
            return self.store.fail(task_id, result.output.clone()).await;
        }
        match result.pull_request() {
            Some(pr) => {
                self.store.record_pr(task_id, pr.url, pr.number, pr.branch).await?;
                self.store.set_output(task_id, result.output.clone()).await
            }
            None => self.store.complete(task_id, result.output.clone()).await,
        }
    }
}

fn is_cancelled(err: &DomainError) -> bool {
    matches!(err, DomainError::InvalidStateTransition { from, .. } if from == TaskStatus::Cancelled.as_str())
}

/// Decrements the in-flight count when an execution ends, however it ends.
struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Submits tasks and runs their executions in the background.
pub struct TaskDispatcher {
    context: ExecutionContext,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl TaskDispatcher {
    /// Dispatcher over the given store, bridge and stream manager. With `streaming`
    /// set, executions use the backend's streaming mode and forward progress events.
    pub fn new(
        store: Arc<TaskStore>,
        bridge: Arc<ExecutionBridge>,
        streams: Arc<StreamManager>,
        streaming: bool,
    ) -> Self {
        Self {
            context: ExecutionContext {
                store,
                bridge,
                streams,
                streaming,
            },
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Task store.
    pub fn store(&self) -> &Arc<TaskStore> {
        &self.context.store
    }

    /// Execution bridge.
    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.context.bridge
    }

    /// Stream manager events are published to.
    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.context.streams
    }

    /// Executions currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Record a task and start executing it. Returns the task while still `pending`.
    pub async fn submit(
        &self,
        description: &str,
        repo_url: Option<String>,
        repo_path: Option<String>,
    ) -> DomainResult<Task> {
        let task = self.context.store.create(description, repo_url, repo_path).await?;
        drop(self.dispatch(task.clone()));
        Ok(task)
    }

    /// Start executing an existing task.
    ///
    /// The handle resolves once the task's final state has been recorded.
    /// Dropping it does not stop the execution.
    pub fn dispatch(&self, task: Task) -> JoinHandle<()> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight {
            count: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        };

        info!(task_id = %task.id, "dispatching task");
        let context = self.context.clone();
        tokio::spawn(async move {
            let _guard = guard;
            context.run(task).await;
        })
    }

    /// Cancel a task. A running execution is not interrupted; its result is discarded.
    pub async fn cancel(&self, id: Uuid) -> DomainResult<Task> {
        let task = self.context.store.cancel(id).await?;
        self.context
            .streams
            .publish(id, &StreamEvent::error(id, "cancelled", false))
            .await;
        Ok(task)
    }

    /// Apply a pull request review outcome. `merged` completes the task and
    /// `closed` cancels it; terminal tasks reject the change.
    pub async fn apply_pr_state(&self, id: Uuid, pr_state: PrState) -> DomainResult<Task> {
        let task = self.context.store.resolve_pr(id, pr_state).await?;

        let event = match pr_state {
            PrState::Open => return Ok(task),
            PrState::Merged => StreamEvent::task_completed(id, true, task.output.clone().unwrap_or_default()),
            PrState::Closed => StreamEvent::error(id, "pull request closed", false),
        };
        self.context.streams.publish(id, &event).await;
        Ok(task)
    }

    /// Wait for in-flight executions. Returns false if some were still running at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        if tokio::time::timeout(timeout, drained).await.is_ok() {
            info!("all executions finished");
            true
        } else {
            warn!(in_flight = self.in_flight(), "shutdown deadline reached with executions still running");
            false
        }
    }
}
