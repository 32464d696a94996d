//! Startup check that the schema is migrated and the task tables exist.

use std::collections::HashSet;

use db::MIGRATOR;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Tables the consistency manager writes to.
pub const REQUIRED_TABLES: [&str; 5] = [
    "projects",
    "tasks",
    "task_messages",
    "templates",
    "template_tasks",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("missing tables: {0}")]
    MissingTables(String),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Compare applied migrations with the embedded ones and check that the
    /// required tables exist.
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_one(&self.pool)
        .await?
            > 0;

        if !migrations_table_exists {
            warn!("Database not initialized - _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                pending_migrations: MIGRATOR
                    .iter()
                    .map(|m| m.description.to_string())
                    .collect(),
                warnings: vec!["Database has not been initialized. Run migrations.".to_string()],
            });
        }

        let applied: HashSet<i64> =
            sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        let pending_migrations: Vec<String> = MIGRATOR
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .map(|m| m.description.to_string())
            .collect();

        let mut warnings = Vec::new();
        if !pending_migrations.is_empty() {
            warnings.push(format!("{} pending migrations", pending_migrations.len()));
        }
        let missing_tables = self.validate_tables(&REQUIRED_TABLES).await?;
        if !missing_tables.is_empty() {
            warnings.push(format!("missing tables: {}", missing_tables.join(", ")));
        }

        info!(
            migrations_applied = applied.len(),
            pending = pending_migrations.len(),
            "Database validation complete"
        );

        Ok(ValidationResult {
            is_initialized: true,
            migrations_applied: applied.len(),
            pending_migrations,
            warnings,
        })
    }

    /// Names from `required_tables` that do not exist.
    pub async fn validate_tables(
        &self,
        required_tables: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing_tables = Vec::new();

        for table in required_tables {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?
                > 0;

            if !exists {
                missing_tables.push(table.to_string());
            }
        }

        Ok(missing_tables)
    }

    /// Fail when any required table is missing.
    pub async fn ensure_tables(&self) -> Result<(), DatabaseValidationError> {
        let missing = self.validate_tables(&REQUIRED_TABLES).await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DatabaseValidationError::MissingTables(missing.join(", ")))
        }
    }

    pub async fn latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        let migration = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(migration)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub pending_migrations: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.warnings.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.warnings.is_empty() {
            format!("Database validation warnings: {}", self.warnings.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn test_migrated_database_is_valid() {
        let db = DBService::new_in_memory().await.unwrap();
        let validator = DatabaseValidator::new(db.pool.clone());

        let result = validator.validate().await.unwrap();
        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(result.migrations_applied, MIGRATOR.iter().count());
        assert!(result.pending_migrations.is_empty());
        validator.ensure_tables().await.unwrap();
        assert_eq!(validator.latest_migration().await.unwrap().as_deref(), Some("init"));
    }

    #[tokio::test]
    async fn test_reports_missing_tables() {
        let db = DBService::new_in_memory().await.unwrap();
        sqlx::query("DROP TABLE template_tasks")
            .execute(&db.pool)
            .await
            .unwrap();
        let validator = DatabaseValidator::new(db.pool.clone());

        let missing = validator.validate_tables(&REQUIRED_TABLES).await.unwrap();
        assert_eq!(missing, vec!["template_tasks".to_string()]);
        assert!(matches!(
            validator.ensure_tables().await,
            Err(DatabaseValidationError::MissingTables(_))
        ));
        assert!(!validator.validate().await.unwrap().is_ok());
    }
}
