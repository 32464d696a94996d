use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::task::Task;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    deployment::Deployment,
    error::ApiError,
    extract::{Path, Query},
};

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub project_id: Option<Uuid>,
}

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let pool = &deployment.db().pool;
    let tasks = match query.project_id {
        Some(project_id) => Task::find_by_project_id(pool, project_id).await?,
        None => Task::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/tasks", get(get_tasks))
        .route("/tasks/{id}", get(get_task))
}
