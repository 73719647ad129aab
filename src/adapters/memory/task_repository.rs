//! In-memory task repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Task;
use crate::domain::ports::{TaskFilter, TaskRepository};

/// Task repository that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(DomainError::ValidationFailed(format!("Task {} already exists", task.id)));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(DomainError::TaskNotFound(task.id)),
        }
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut result: Vec<Task> = tasks
            .values()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}
