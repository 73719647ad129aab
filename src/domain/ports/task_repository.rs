//! Task persistence port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

/// Filters for querying tasks
#[derive(Default, Debug, Clone)]
pub struct TaskFilter {
    /// Only tasks in this status.
    pub status: Option<TaskStatus>,
    /// At most this many tasks.
    pub limit: Option<usize>,
}

/// Repository port for task persistence.
///
/// Implementations only store and load tasks; lifecycle rules and per-task
/// serialization of mutations live in the task store service.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Replace a stored task; `TaskNotFound` if it was never created
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// List tasks, newest first
    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;
}
