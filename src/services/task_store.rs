//! Task lifecycle service.
//!
//! Wraps a [`TaskRepository`] with the task state machine. Every mutation of a
//! task runs under that task's own async lock, so concurrent transitions on one
//! task are linearized while unrelated tasks proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PrState, Task, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

/// Registry of per-task locks. Entries are dropped once nobody holds them.
#[derive(Debug, Default)]
struct TaskLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl TaskLocks {
    async fn acquire(&self, id: Uuid) -> TaskLockGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };
        TaskLockGuard {
            guard: Some(lock.lock_owned().await),
            locks: self,
            id,
        }
    }

    fn release(&self, id: Uuid) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct TaskLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a TaskLocks,
    id: Uuid,
}

impl Drop for TaskLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.id);
    }
}

fn invalid_transition(task: &Task, to: TaskStatus, reason: impl Into<String>) -> DomainError {
    DomainError::InvalidStateTransition {
        from: task.status.as_str().to_string(),
        to: to.as_str().to_string(),
        reason: reason.into(),
    }
}

fn transition(task: &mut Task, to: TaskStatus) -> DomainResult<()> {
    if task.status.is_terminal() {
        return Err(invalid_transition(task, to, "task is already terminal"));
    }
    task.transition_to(to).map_err(|reason| invalid_transition(task, to, reason))
}

/// Status a review outcome drives the task towards.
fn pr_target(pr_state: PrState) -> TaskStatus {
    match pr_state {
        PrState::Open => TaskStatus::PrOpen,
        PrState::Merged => TaskStatus::Completed,
        PrState::Closed => TaskStatus::Cancelled,
    }
}

fn check_pr_update(task: &Task, pr_state: PrState) -> DomainResult<()> {
    if !task.has_pr() {
        return Err(DomainError::ValidationFailed(format!("Task {} has no pull request", task.id)));
    }
    if task.is_terminal() {
        return Err(invalid_transition(task, pr_target(pr_state), "task is already terminal"));
    }
    Ok(())
}

/// Owner of task state and the only writer of task transitions.
pub struct TaskStore {
    repo: Arc<dyn TaskRepository>,
    locks: TaskLocks,
}

impl TaskStore {
    /// Store persisting through `repo`.
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self {
            repo,
            locks: TaskLocks::default(),
        }
    }

    /// Record a new pending task.
    pub async fn create(
        &self,
        description: &str,
        repo_url: Option<String>,
        repo_path: Option<String>,
    ) -> DomainResult<Task> {
        let description = description.trim();
        if description.is_empty() {
            return Err(DomainError::ValidationFailed("Task description cannot be empty".to_string()));
        }

        let mut task = Task::new(description);
        task.repo_url = repo_url.filter(|u| !u.trim().is_empty());
        task.repo_path = repo_path.filter(|p| !p.trim().is_empty());
        task.validate().map_err(DomainError::ValidationFailed)?;

        self.repo.create(&task).await?;
        info!(task_id = %task.id, "task created");
        Ok(task)
    }

    /// Load a task, failing with `TaskNotFound` when it does not exist.
    pub async fn get(&self, id: Uuid) -> DomainResult<Task> {
        self.repo.get(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> DomainResult<Vec<Task>> {
        self.repo.list(TaskFilter::default()).await
    }

    /// Tasks matching `filter`, newest first.
    pub async fn list_filtered(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        self.repo.list(filter).await
    }

    /// Most recently created task, optionally restricted to non-terminal ones.
    pub async fn latest(&self, active_only: bool) -> DomainResult<Option<Task>> {
        if !active_only {
            let mut latest = self
                .repo
                .list(TaskFilter {
                    status: None,
                    limit: Some(1),
                })
                .await?;
            return Ok(latest.pop());
        }
        Ok(self.list().await?.into_iter().find(|t| !t.is_terminal()))
    }

    /// `pending -> running`. Already running is a no-op.
    pub async fn mark_running(&self, id: Uuid) -> DomainResult<Task> {
        self.mutate(id, |task| {
            if task.status == TaskStatus::Running {
                return Ok(false);
            }
            if task.status != TaskStatus::Pending {
                return Err(invalid_transition(task, TaskStatus::Running, "task is not pending"));
            }
            transition(task, TaskStatus::Running)?;
            Ok(true)
        })
        .await
    }

    /// `pending|running|pr_open -> completed`, recording the output.
    pub async fn complete(&self, id: Uuid, output: impl Into<String>) -> DomainResult<Task> {
        let output = output.into();
        self.mutate(id, move |task| {
            transition(task, TaskStatus::Completed)?;
            task.output = Some(output);
            Ok(true)
        })
        .await
    }

    /// Move a non-terminal task to `failed`, recording the error.
    pub async fn fail(&self, id: Uuid, error: impl Into<String>) -> DomainResult<Task> {
        let error = error.into();
        self.mutate(id, move |task| {
            transition(task, TaskStatus::Failed)?;
            task.error = Some(error);
            Ok(true)
        })
        .await
    }

    /// Cancel a non-terminal task.
    pub async fn cancel(&self, id: Uuid) -> DomainResult<Task> {
        self.mutate(id, |task| {
            transition(task, TaskStatus::Cancelled)?;
            Ok(true)
        })
        .await
    }

    /// Attach a pull request. Valid from `running` and `pr_open`.
    pub async fn record_pr(
        &self,
        id: Uuid,
        pr_url: impl Into<String>,
        pr_number: u64,
        pr_branch: impl Into<String>,
    ) -> DomainResult<Task> {
        if pr_number == 0 {
            return Err(DomainError::ValidationFailed("PR number must be positive".to_string()));
        }
        let (pr_url, pr_branch) = (pr_url.into(), pr_branch.into());

        self.mutate(id, move |task| {
            if !matches!(task.status, TaskStatus::Running | TaskStatus::PrOpen) {
                return Err(invalid_transition(
                    task,
                    TaskStatus::PrOpen,
                    "a pull request can only be recorded for a running task",
                ));
            }
            task.open_pr(pr_url, pr_number, pr_branch)
                .map_err(|reason| invalid_transition(task, TaskStatus::PrOpen, reason))?;
            Ok(true)
        })
        .await
    }

    /// Replace the recorded output without touching the status.
    pub async fn set_output(&self, id: Uuid, output: impl Into<String>) -> DomainResult<Task> {
        let output = output.into();
        self.mutate(id, move |task| {
            if task.output.as_deref() == Some(output.as_str()) {
                return Ok(false);
            }
            task.output = Some(output);
            task.updated_at = chrono::Utc::now();
            Ok(true)
        })
        .await
    }

    /// Update the review state of an attached pull request. Does not change `status`.
    ///
    /// Terminal tasks are frozen and reject the update.
    pub async fn update_pr_state(&self, id: Uuid, pr_state: PrState) -> DomainResult<Task> {
        self.mutate(id, move |task| {
            check_pr_update(task, pr_state)?;
            if task.pr_state == Some(pr_state) {
                return Ok(false);
            }
            task.pr_state = Some(pr_state);
            task.updated_at = chrono::Utc::now();
            Ok(true)
        })
        .await
    }

    /// Record a review outcome and its effect on the task in one step:
    /// `merged` completes the task keeping its output, `closed` cancels it and
    /// `open` only records the state.
    pub async fn resolve_pr(&self, id: Uuid, pr_state: PrState) -> DomainResult<Task> {
        self.mutate(id, move |task| {
            check_pr_update(task, pr_state)?;
            let changed = task.pr_state != Some(pr_state);
            task.pr_state = Some(pr_state);
            match pr_state {
                PrState::Open => {
                    if changed {
                        task.updated_at = chrono::Utc::now();
                    }
                    Ok(changed)
                }
                PrState::Merged => transition(task, TaskStatus::Completed).map(|()| true),
                PrState::Closed => transition(task, TaskStatus::Cancelled).map(|()| true),
            }
        })
        .await
    }

    /// Load, modify and persist one task under its lock.
    ///
    /// `apply` returns whether the task changed; unchanged tasks are not written.
    async fn mutate<F>(&self, id: Uuid, apply: F) -> DomainResult<Task>
    where
        F: FnOnce(&mut Task) -> DomainResult<bool> + Send,
    {
        let _guard = self.locks.acquire(id).await;

        let mut task = self.get(id).await?;
        let from = task.status;

        match apply(&mut task) {
            Ok(true) => {
                self.repo.update(&task).await?;
                debug!(task_id = %id, from = %from, to = %task.status, "task updated");
                Ok(task)
            }
            Ok(false) => Ok(task),
            Err(err) => {
                warn!(task_id = %id, status = %from, error = %err, "task mutation rejected");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryTaskRepository;

    fn store() -> TaskStore {
        TaskStore::new(Arc::new(InMemoryTaskRepository::new()))
    }

    fn assert_completed_at_invariant(task: &Task) {
        assert_eq!(task.completed_at.is_some(), task.status.is_terminal(), "{task:?}");
    }

    #[tokio::test]
    async fn test_create_validates_description() {
        let store = store();
        let err = store.create("   ", None, None).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let task = store
            .create("  fix login bug ", Some("https://github.com/acme/web".into()), Some(String::new()))
            .await
            .unwrap();
        assert_eq!(task.description, "fix login bug");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.repo_path.is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_task() {
        let err = store().get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_running_is_idempotent() {
        let store = store();
        let task = store.create("add tests", None, None).await.unwrap();

        let running = store.mark_running(task.id).await.unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        let again = store.mark_running(task.id).await.unwrap();
        assert_eq!(again.updated_at, running.updated_at);

        store.complete(task.id, "done").await.unwrap();
        assert!(store.mark_running(task.id).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_and_fail_set_completed_at() {
        let store = store();
        let a = store.create("a task", None, None).await.unwrap();
        let b = store.create("b task", None, None).await.unwrap();
        store.mark_running(a.id).await.unwrap();
        store.mark_running(b.id).await.unwrap();

        let done = store.complete(a.id, "all good").await.unwrap();
        assert_eq!(done.output.as_deref(), Some("all good"));
        assert_completed_at_invariant(&done);

        let failed = store.fail(b.id, "boom").await.unwrap();
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_completed_at_invariant(&failed);

        assert!(store.complete(a.id, "again").await.is_err());
        assert!(store.fail(b.id, "again").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let store = store();

        for setup in [TaskStatus::Pending, TaskStatus::Running, TaskStatus::PrOpen] {
            let task = store.create("cancellable", None, None).await.unwrap();
            if setup != TaskStatus::Pending {
                store.mark_running(task.id).await.unwrap();
            }
            if setup == TaskStatus::PrOpen {
                store.record_pr(task.id, "https://github.com/a/b/pull/1", 1, "cadence/x").await.unwrap();
            }
            let cancelled = store.cancel(task.id).await.unwrap();
            assert_eq!(cancelled.status, TaskStatus::Cancelled);
            assert_completed_at_invariant(&cancelled);
        }

        let completed = store.create("finished", None, None).await.unwrap();
        store.complete(completed.id, "ok").await.unwrap();
        let err = store.cancel(completed.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let failed = store.create("broken", None, None).await.unwrap();
        store.fail(failed.id, "err").await.unwrap();
        assert!(store.cancel(failed.id).await.is_err());

        let twice = store.create("twice", None, None).await.unwrap();
        store.cancel(twice.id).await.unwrap();
        assert!(store.cancel(twice.id).await.is_err());
    }

    #[tokio::test]
    async fn test_record_pr_rules() {
        let store = store();
        let task = store.create("open a pr", None, None).await.unwrap();

        let err = store.record_pr(task.id, "https://github.com/a/b/pull/2", 2, "b").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        store.mark_running(task.id).await.unwrap();
        let err = store.record_pr(task.id, "https://github.com/a/b/pull/0", 0, "b").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let pr = store.record_pr(task.id, "https://github.com/a/b/pull/2", 2, "b").await.unwrap();
        assert_eq!(pr.status, TaskStatus::PrOpen);
        assert_eq!(pr.pr_state, Some(PrState::Open));
        assert!(pr.completed_at.is_none());

        let merged = store.update_pr_state(task.id, PrState::Merged).await.unwrap();
        assert_eq!(merged.pr_state, Some(PrState::Merged));
        assert_eq!(merged.status, TaskStatus::PrOpen);

        let done = store.complete(task.id, "merged").await.unwrap();
        assert_completed_at_invariant(&done);
    }

    #[tokio::test]
    async fn test_update_pr_state_requires_pr() {
        let store = store();
        let task = store.create("no pr", None, None).await.unwrap();
        let err = store.update_pr_state(task.id, PrState::Closed).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    async fn task_with_open_pr(store: &TaskStore) -> Task {
        let task = store.create("ship it", None, None).await.unwrap();
        store.mark_running(task.id).await.unwrap();
        store.record_pr(task.id, "https://github.com/a/b/pull/7", 7, "cadence/ship").await.unwrap();
        store.set_output(task.id, "opened #7").await.unwrap()
    }

    #[tokio::test]
    async fn test_resolve_pr_moves_status_with_pr_state() {
        let store = store();

        let merged = task_with_open_pr(&store).await;
        let merged = store.resolve_pr(merged.id, PrState::Merged).await.unwrap();
        assert_eq!(merged.status, TaskStatus::Completed);
        assert_eq!(merged.pr_state, Some(PrState::Merged));
        assert_eq!(merged.output.as_deref(), Some("opened #7"));
        assert_completed_at_invariant(&merged);

        let closed = task_with_open_pr(&store).await;
        let closed = store.resolve_pr(closed.id, PrState::Closed).await.unwrap();
        assert_eq!(closed.status, TaskStatus::Cancelled);
        assert_eq!(closed.pr_state, Some(PrState::Closed));
        assert_completed_at_invariant(&closed);

        let reopened = task_with_open_pr(&store).await;
        let same = store.resolve_pr(reopened.id, PrState::Open).await.unwrap();
        assert_eq!(same.status, TaskStatus::PrOpen);
        assert_eq!(same.updated_at, reopened.updated_at);
    }

    #[tokio::test]
    async fn test_terminal_task_rejects_pr_state_changes() {
        let store = store();
        let task = task_with_open_pr(&store).await;
        store.resolve_pr(task.id, PrState::Closed).await.unwrap();

        let err = store.resolve_pr(task.id, PrState::Merged).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        let err = store.update_pr_state(task.id, PrState::Merged).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let unchanged = store.get(task.id).await.unwrap();
        assert_eq!(unchanged.status, TaskStatus::Cancelled);
        assert_eq!(unchanged.pr_state, Some(PrState::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pr_outcomes_apply_once() {
        let store = Arc::new(store());
        let id = task_with_open_pr(&store).await.id;

        let handles: Vec<_> = [PrState::Merged, PrState::Closed, PrState::Merged, PrState::Closed]
            .into_iter()
            .map(|pr_state| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.resolve_pr(id, pr_state).await.ok() })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            if let Some(task) = handle.await.unwrap() {
                winners.push(task);
            }
        }
        assert_eq!(winners.len(), 1);

        let settled = store.get(id).await.unwrap();
        let expected = if settled.pr_state == Some(PrState::Merged) {
            TaskStatus::Completed
        } else {
            TaskStatus::Cancelled
        };
        assert_eq!(settled.status, expected);
        assert_eq!(settled.status, winners[0].status);
    }

    #[tokio::test]
    async fn test_latest_task() {
        let store = store();
        assert!(store.latest(false).await.unwrap().is_none());

        let first = store.create("first", None, None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create("second", None, None).await.unwrap();
        store.cancel(second.id).await.unwrap();

        assert_eq!(store.latest(false).await.unwrap().unwrap().id, second.id);
        assert_eq!(store.latest(true).await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cancels_are_serialized() {
        let store = Arc::new(store());
        let id = store.create("contended", None, None).await.unwrap().id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.cancel(id).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.locks.len(), 0);
    }
}
