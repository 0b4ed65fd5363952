//! `/api/tasks` endpoints.

use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use tracker_core::models::Task;
use tracker_core::schema::{NewTask, TaskPatch};
use tracker_core::tasks::{TaskPage, TaskQuery, TaskStats};

use crate::api::{ApiResult, AppState, JsonBody, QueryParams};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/stats", get(task_stats))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

/// GET /api/tasks
async fn list_tasks(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TaskQuery>,
) -> ApiResult<Json<TaskPage>> {
    let query = query.validated()?;
    Ok(Json(state.db.list_tasks(&query).await?))
}

/// GET /api/tasks/stats
async fn task_stats(State(state): State<AppState>) -> ApiResult<Json<TaskStats>> {
    Ok(Json(state.db.task_stats().await?))
}

/// POST /api/tasks
async fn create_task(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.db.create_task(new).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/{id}
async fn get_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    Ok(Json(state.db.get_task(id).await?))
}

/// PATCH /api/tasks/{id}
async fn update_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    Ok(Json(state.db.update_task(id, patch).await?))
}

/// DELETE /api/tasks/{id}
async fn delete_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.db.delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
