use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    database_validator::DatabaseValidationError, project_tasks::ProjectTaskError,
    reconciliation::ReconciliationError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    ProjectTask(#[from] ProjectTaskError),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] JsonRejection),
    #[error(transparent)]
    Path(#[from] PathRejection),
    #[error(transparent)]
    Query(#[from] QueryRejection),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ProjectTask(err) => project_task_status(err),
            ApiError::Reconciliation(ReconciliationError::ProjectTask(err)) => {
                project_task_status(err)
            }
            ApiError::Json(rejection) => rejection.status(),
            ApiError::Path(rejection) => rejection.status(),
            ApiError::Query(rejection) => rejection.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Reconciliation(ReconciliationError::Database(_))
            | ApiError::DatabaseValidation(_)
            | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn project_task_status(err: &ProjectTaskError) -> StatusCode {
    match err {
        ProjectTaskError::Validation(_) => StatusCode::BAD_REQUEST,
        ProjectTaskError::ProjectNotFound
        | ProjectTaskError::TaskNotFound
        | ProjectTaskError::TemplateNotFound => StatusCode::NOT_FOUND,
        ProjectTaskError::DisplayIdExhausted(_) | ProjectTaskError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let response = ApiResponse::<()>::error(&message);
        (status, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(ProjectTaskError::Validation("missing".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ProjectTaskError::ProjectNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(ProjectTaskError::TemplateNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(ProjectTaskError::Database(sqlx::Error::RowNotFound)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(ReconciliationError::ProjectTask(
                    ProjectTaskError::DisplayIdExhausted(16),
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::NotFound("template not found".into()),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error}");
        }
    }

    #[test]
    fn test_database_message_is_attached() {
        let error = ApiError::from(sqlx::Error::PoolClosed);
        assert!(error.to_string().contains("closed"));
    }
}
