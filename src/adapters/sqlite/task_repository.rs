//! [`TaskRepository`] over SQLite.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PrState, Task, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

/// Fixed-width timestamps so that text ordering matches time ordering.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::SerializationError(format!("Invalid timestamp {value}: {e}")))
}

/// Task repository over a migrated SQLite pool.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Repository over `pool`, which must already be migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO tasks (id, description, repo_url, repo_path, status, output, error,
               pr_url, pr_number, pr_branch, pr_state, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(task.id.to_string())
        .bind(&task.description)
        .bind(&task.repo_url)
        .bind(&task.repo_path)
        .bind(task.status.as_str())
        .bind(&task.output)
        .bind(&task.error)
        .bind(&task.pr_url)
        .bind(pr_number_column(task.pr_number)?)
        .bind(&task.pr_branch)
        .bind(task.pr_state.map(|s| s.as_str()))
        .bind(timestamp(task.created_at))
        .bind(timestamp(task.updated_at))
        .bind(task.completed_at.map(timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE tasks SET description = ?, repo_url = ?, repo_path = ?, status = ?,
               output = ?, error = ?, pr_url = ?, pr_number = ?, pr_branch = ?, pr_state = ?,
               updated_at = ?, completed_at = ?
               WHERE id = ?"#
        )
        .bind(&task.description)
        .bind(&task.repo_url)
        .bind(&task.repo_path)
        .bind(task.status.as_str())
        .bind(&task.output)
        .bind(&task.error)
        .bind(&task.pr_url)
        .bind(pr_number_column(task.pr_number)?)
        .bind(&task.pr_branch)
        .bind(task.pr_state.map(|s| s.as_str()))
        .bind(timestamp(task.updated_at))
        .bind(task.completed_at.map(timestamp))
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC, id DESC");
        if filter.limit.is_some() {
            query.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Task::try_from).collect()
    }
}

fn pr_number_column(pr_number: Option<u64>) -> DomainResult<Option<i64>> {
    pr_number
        .map(i64::try_from)
        .transpose()
        .map_err(|_| DomainError::ValidationFailed("PR number out of range".to_string()))
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    description: String,
    repo_url: Option<String>,
    repo_path: Option<String>,
    status: String,
    output: Option<String>,
    error: Option<String>,
    pr_url: Option<String>,
    pr_number: Option<i64>,
    pr_branch: Option<String>,
    pr_state: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let pr_state = row
            .pr_state
            .map(|s| PrState::from_str(&s).ok_or_else(|| DomainError::SerializationError(format!("Invalid PR state: {s}"))))
            .transpose()?;

        let pr_number = row
            .pr_number
            .map(u64::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(Task {
            id: Uuid::parse_str(&row.id).map_err(|e| DomainError::SerializationError(e.to_string()))?,
            description: row.description,
            repo_url: row.repo_url,
            repo_path: row.repo_path,
            status,
            output: row.output,
            error: row.error,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            completed_at: row.completed_at.as_deref().map(parse_timestamp).transpose()?,
            pr_url: row.pr_url,
            pr_number,
            pr_branch: row.pr_branch,
            pr_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Duration;

    async fn setup_test_repo() -> SqliteTaskRepository {
        SqliteTaskRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_get_task() {
        let repo = setup_test_repo().await;
        let task = Task::new("fix login bug").with_repo_url("https://github.com/acme/web");

        repo.create(&task).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, task.id);
        assert_eq!(retrieved.description, "fix login bug");
        assert_eq!(retrieved.repo_url, task.repo_url);
        assert_eq!(retrieved.status, TaskStatus::Pending);
        assert!(retrieved.completed_at.is_none());

        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_persists_pull_request() {
        let repo = setup_test_repo().await;
        let mut task = Task::new("open a pr");
        repo.create(&task).await.unwrap();

        task.transition_to(TaskStatus::Running).unwrap();
        task.open_pr("https://github.com/acme/web/pull/5", 5, "cadence/pr").unwrap();
        task.output = Some("opened".to_string());
        repo.update(&task).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, TaskStatus::PrOpen);
        assert_eq!(retrieved.pr_number, Some(5));
        assert_eq!(retrieved.pr_state, Some(PrState::Open));
        assert_eq!(retrieved.output.as_deref(), Some("opened"));
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let repo = setup_test_repo().await;
        let err = repo.update(&Task::new("ghost")).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let repo = setup_test_repo().await;
        let mut old = Task::new("old");
        old.created_at -= Duration::minutes(5);
        let mut done = Task::new("done");
        done.transition_to(TaskStatus::Completed).unwrap();
        repo.create(&old).await.unwrap();
        repo.create(&done).await.unwrap();

        let all = repo.list(TaskFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|t| t.description.as_str()).collect::<Vec<_>>(), vec!["done", "old"]);
        assert!(all[0].completed_at.is_some());

        let completed = repo
            .list(TaskFilter {
                status: Some(TaskStatus::Completed),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);

        let one = repo
            .list(TaskFilter {
                status: None,
                limit: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(one[0].description, "done");
    }
}
