//! Templates and the blueprint tasks copied into projects created from them.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::template::{
    CreateTemplate, CreateTemplateTask, Template, TemplateTask, UpdateTemplate,
    UpdateTemplateTask,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    deployment::Deployment,
    error::ApiError,
    extract::{Json, Path},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TemplateWithTasks {
    #[serde(flatten)]
    pub template: Template,
    pub tasks: Vec<TemplateTask>,
}

fn require_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn get_templates(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Template>>>, ApiError> {
    let templates = Template::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(templates)))
}

pub async fn create_template(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTemplate>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Template>>), ApiError> {
    require_text(&payload.name, "name")?;
    let template = Template::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    tracing::info!(template_id = %template.id, "Created template");
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(template)),
    ))
}

pub async fn get_template(
    State(deployment): State<DeploymentImpl>,
    Path(template_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TemplateWithTasks>>, ApiError> {
    let pool = &deployment.db().pool;
    let template = load_template(&deployment, template_id).await?;
    let tasks = TemplateTask::find_by_template_id(pool, template_id).await?;
    Ok(ResponseJson(ApiResponse::success(TemplateWithTasks {
        template,
        tasks,
    })))
}

pub async fn update_template(
    State(deployment): State<DeploymentImpl>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<UpdateTemplate>,
) -> Result<ResponseJson<ApiResponse<Template>>, ApiError> {
    require_text(&payload.name, "name")?;
    let template = Template::rename(&deployment.db().pool, template_id, &payload.name)
        .await?
        .ok_or_else(|| ApiError::NotFound("template not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(template)))
}

/// DELETE /api/templates/{id}
/// Removes the template and its blueprints. Projects created from it keep
/// their tasks.
pub async fn delete_template(
    State(deployment): State<DeploymentImpl>,
    Path(template_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let mut tx = db::begin_write(&deployment.db().pool).await?;
    if Template::delete(&mut *tx, template_id).await? == 0 {
        return Err(ApiError::NotFound("template not found".to_string()));
    }
    let blueprints = TemplateTask::delete_by_template_id(&mut *tx, template_id).await?;
    tx.commit().await?;

    tracing::info!(template_id = %template_id, blueprints, "Deleted template");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_template_tasks(
    State(deployment): State<DeploymentImpl>,
    Path(template_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TemplateTask>>>, ApiError> {
    load_template(&deployment, template_id).await?;
    let tasks = TemplateTask::find_by_template_id(&deployment.db().pool, template_id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn create_template_task(
    State(deployment): State<DeploymentImpl>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<CreateTemplateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<TemplateTask>>), ApiError> {
    require_text(&payload.title, "title")?;
    load_template(&deployment, template_id).await?;
    let task = TemplateTask::create(
        &deployment.db().pool,
        template_id,
        &payload,
        Uuid::new_v4(),
    )
    .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub async fn get_template_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TemplateTask>>, ApiError> {
    let task = TemplateTask::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("template task not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_template_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTemplateTask>,
) -> Result<ResponseJson<ApiResponse<TemplateTask>>, ApiError> {
    if let Some(title) = &payload.title {
        require_text(title, "title")?;
    }
    let task = TemplateTask::update(&deployment.db().pool, task_id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("template task not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_template_task(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if TemplateTask::delete(&deployment.db().pool, task_id).await? == 0 {
        return Err(ApiError::NotFound("template task not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

async fn load_template(
    deployment: &DeploymentImpl,
    template_id: Uuid,
) -> Result<Template, ApiError> {
    Template::find_by_id(&deployment.db().pool, template_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("template not found".to_string()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/templates", get(get_templates).post(create_template))
        .route(
            "/templates/{id}",
            get(get_template)
                .put(update_template)
                .delete(delete_template),
        )
        .route(
            "/templates/{id}/tasks",
            get(get_template_tasks).post(create_template_task),
        )
        .route(
            "/template-tasks/{id}",
            get(get_template_task)
                .put(update_template_task)
                .delete(delete_template_task),
        )
}
