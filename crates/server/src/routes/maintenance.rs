use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::post,
};
use serde::Deserialize;
use services::services::reconciliation::ReconciliationReport;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, deployment::Deployment, error::ApiError, extract::Query};

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/maintenance/reconcile?dry_run=true
/// Report (and unless dry_run, repair) drift between task representations
pub async fn reconcile(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<ReconcileQuery>,
) -> Result<ResponseJson<ApiResponse<ReconciliationReport>>, ApiError> {
    let service = deployment.reconciliation();
    let report = if query.dry_run {
        service.scan().await?
    } else {
        service.repair().await?
    };
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/maintenance/reconcile", post(reconcile))
}
