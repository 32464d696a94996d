use std::sync::Arc;

use db::DBService;
use services::services::{
    database_validator::{DatabaseValidationError, DatabaseValidator},
    project_tasks::ProjectTaskService,
    reconciliation::ReconciliationService,
};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] DatabaseValidationError),
}

/// Shared state handed to every route handler.
pub trait Deployment: Clone + Send + Sync + 'static {
    fn db(&self) -> &DBService;

    fn config(&self) -> &Config;

    fn project_tasks(&self) -> ProjectTaskService {
        ProjectTaskService::new(self.db().pool.clone())
    }

    fn reconciliation(&self) -> ReconciliationService {
        ReconciliationService::new(self.db().pool.clone())
    }
}

#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    config: Arc<Config>,
}

impl LocalDeployment {
    pub fn new(db: DBService, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Open the configured database and check its schema.
    pub async fn connect(config: Config) -> Result<Self, DeploymentError> {
        let db = DBService::new(&config.database_url).await?;
        let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
        if !validation.is_ok() {
            tracing::warn!("{}", validation.summary());
            DatabaseValidator::new(db.pool.clone()).ensure_tables().await?;
        } else {
            tracing::info!("{}", validation.summary());
        }
        Ok(Self::new(db, config))
    }

    pub async fn validate(&self) -> Result<(), DatabaseValidationError> {
        DatabaseValidator::new(self.db.pool.clone())
            .ensure_tables()
            .await
    }
}

impl Deployment for LocalDeployment {
    fn db(&self) -> &DBService {
        &self.db
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
