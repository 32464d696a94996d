use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{DeploymentImpl, deployment::Deployment};

pub mod health;
pub mod maintenance;
pub mod projects;
pub mod task_messages;
pub mod tasks;
pub mod templates;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(projects::router(&deployment))
        .merge(tasks::router(&deployment))
        .merge(task_messages::router(&deployment))
        .merge(templates::router(&deployment))
        .merge(maintenance::router(&deployment));

    let cors_allow_any = deployment.config().cors_allow_any;
    let app = Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment);

    if cors_allow_any {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
