//! Task endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::domain::models::{PrState, Task, TaskStatus};
use crate::domain::ports::TaskFilter;

/// Request to submit a new task.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// What to do. Must not be blank.
    #[serde(default)]
    pub description: String,
    /// Remote repository.
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Local checkout.
    #[serde(default)]
    pub repo_path: Option<String>,
}

/// Query parameters for task listing.
#[derive(Debug, Deserialize)]
pub struct TaskQueryParams {
    /// Status name to filter on.
    #[serde(default)]
    pub status: Option<String>,
    /// Maximum number of tasks returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `GET /tasks`.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    /// Tasks, newest first.
    pub tasks: Vec<Task>,
}

/// Body of `DELETE /tasks/{id}`.
#[derive(Debug, Serialize)]
pub struct CancelTaskResponse {
    /// Always true; failures are error responses.
    pub success: bool,
    /// The cancelled task.
    pub task: Task,
}

/// Body of `POST /tasks/{id}/pr`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrStateRequest {
    /// `open`, `merged` or `closed`.
    pub pr_state: String,
}

/// `POST /tasks`
pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(req) = payload?;
    let task = state
        .dispatcher
        .submit(&req.description, req.repo_url, req.repo_path)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    params: Result<Query<TaskQueryParams>, QueryRejection>,
) -> ApiResult<Json<TaskListResponse>> {
    let Query(params) = params?;
    let status = params
        .status
        .as_deref()
        .map(|s| TaskStatus::from_str(s).ok_or_else(|| ApiError::bad_request(format!("Invalid status: {s}"))))
        .transpose()?;

    let tasks = state
        .dispatcher
        .store()
        .list_filtered(TaskFilter {
            status,
            limit: params.limit,
        })
        .await?;
    Ok(Json(TaskListResponse { tasks }))
}

/// `GET /tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    Ok(Json(state.dispatcher.store().get(id).await?))
}

/// `DELETE /tasks/{id}`
pub async fn cancel_task(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<CancelTaskResponse>> {
    let Path(id) = id?;
    let task = state.dispatcher.cancel(id).await?;
    Ok(Json(CancelTaskResponse { success: true, task }))
}

/// `POST /tasks/{id}/pr`
pub async fn update_pr_state(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PrStateRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let pr_state = PrState::from_str(&req.pr_state)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid PR state: {}", req.pr_state)))?;

    Ok(Json(state.dispatcher.apply_pr_state(id, pr_state).await?))
}
