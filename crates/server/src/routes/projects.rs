use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::project::{CreateProject, Project, StageProgress, UpdateProject};
use services::services::project_tasks::{
    AddProjectTask, AddedTask, DeleteProjectTask, DeletedProject, DeletedTask, UpdateProjectTask,
    UpdatedTask,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    deployment::Deployment,
    error::ApiError,
    extract::{Json, Path},
};

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

/// POST /api/projects
/// Create a project along with its tasks and their message threads
pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Project>>), ApiError> {
    let project = deployment.project_tasks().create_project(payload).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(project)),
    ))
}

pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = load_project(&deployment, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// PUT /api/projects/{id}
/// Update name, assignees or assigning owner. Tasks are edited through
/// /api/projects/tasks.
pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("project name cannot be empty".to_string()));
    }

    let project = Project::update(&deployment.db().pool, project_id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("project not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<DeletedProject>>, ApiError> {
    let deleted = deployment.project_tasks().delete_project(project_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        deleted,
        "Project and related data deleted",
    )))
}

pub async fn get_project_progress(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<StageProgress>>>, ApiError> {
    let project = load_project(&deployment, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(project.stage_progress())))
}

/// POST /api/projects/tasks
pub async fn add_project_task(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<AddProjectTask>,
) -> Result<ResponseJson<ApiResponse<AddedTask>>, ApiError> {
    let added = deployment.project_tasks().add_task(payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        added,
        "Task added successfully",
    )))
}

/// PATCH /api/projects/tasks
pub async fn update_project_task(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProjectTask>,
) -> Result<ResponseJson<ApiResponse<UpdatedTask>>, ApiError> {
    let updated = deployment.project_tasks().update_task(payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/projects/tasks
pub async fn delete_project_task(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<DeleteProjectTask>,
) -> Result<ResponseJson<ApiResponse<DeletedTask>>, ApiError> {
    let deleted = deployment.project_tasks().delete_task(payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        deleted,
        "Task deleted successfully",
    )))
}

async fn load_project(deployment: &DeploymentImpl, project_id: Uuid) -> Result<Project, ApiError> {
    Project::find_by_id(&deployment.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("project not found".to_string()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/projects", get(get_projects).post(create_project))
        .route(
            "/projects/tasks",
            post(add_project_task)
                .patch(update_project_task)
                .delete(delete_project_task),
        )
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/progress", get(get_project_progress))
}
