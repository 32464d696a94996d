pub mod database_validator;
pub mod project_tasks;
pub mod reconciliation;
