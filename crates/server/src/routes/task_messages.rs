use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    task::Task,
    task_message::{CreateTaskMessage, TaskMessage, TaskMessageFilter, UpdateTaskMessage},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    deployment::Deployment,
    error::ApiError,
    extract::{Json, Path, Query},
};

/// GET /api/task-messages?project_id=&task_id=
/// Newest first
pub async fn get_task_messages(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<TaskMessageFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskMessage>>>, ApiError> {
    let messages = TaskMessage::find_filtered(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

/// POST /api/task-messages
/// The task must exist and belong to `project_id`.
pub async fn create_task_message(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTaskMessage>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<TaskMessage>>), ApiError> {
    let pool = &deployment.db().pool;
    let task = Task::find_by_id(pool, payload.task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;
    if task.project_id != payload.project_id {
        return Err(ApiError::BadRequest(
            "task does not belong to project".to_string(),
        ));
    }

    let message = TaskMessage::create(pool, &payload, Uuid::new_v4(), false).await?;
    tracing::debug!(task_id = %message.task_id, message_id = %message.id, "Posted task message");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(message)),
    ))
}

pub async fn get_task_message(
    State(deployment): State<DeploymentImpl>,
    Path(message_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskMessage>>, ApiError> {
    let message = TaskMessage::find_by_id(&deployment.db().pool, message_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task message not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub async fn update_task_message(
    State(deployment): State<DeploymentImpl>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskMessage>,
) -> Result<ResponseJson<ApiResponse<TaskMessage>>, ApiError> {
    let message = TaskMessage::update(&deployment.db().pool, message_id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("task message not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub async fn delete_task_message(
    State(deployment): State<DeploymentImpl>,
    Path(message_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if TaskMessage::delete(&deployment.db().pool, message_id).await? == 0 {
        return Err(ApiError::NotFound("task message not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/task-messages",
            get(get_task_messages).post(create_task_message),
        )
        .route(
            "/task-messages/{id}",
            get(get_task_message)
                .put(update_task_message)
                .delete(delete_task_message),
        )
}
