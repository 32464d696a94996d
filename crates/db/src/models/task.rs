use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Executor, FromRow, Sqlite, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::date::{deserialize_empty_as_none, deserialize_optional_date};
use uuid::Uuid;

use super::project::TaskSnapshot;

/// Delivery stage a task belongs to. Declaration order is the display order.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "task_stage")]
#[strum(ascii_case_insensitive)]
pub enum TaskStage {
    /// Placeholder for tasks submitted without a stage
    #[default]
    #[sqlx(rename = "Not Started")]
    #[serde(rename = "Not Started")]
    #[strum(to_string = "Not Started")]
    NotStarted,
    #[sqlx(rename = "onboarding stage")]
    #[serde(rename = "onboarding stage", alias = "onboarding")]
    #[strum(to_string = "onboarding stage", serialize = "onboarding")]
    Onboarding,
    #[sqlx(rename = "design stage")]
    #[serde(rename = "design stage", alias = "design")]
    #[strum(to_string = "design stage", serialize = "design")]
    Design,
    #[sqlx(rename = "development")]
    #[serde(rename = "development")]
    #[strum(to_string = "development")]
    Development,
    #[sqlx(rename = "website review")]
    #[serde(rename = "website review", alias = "review")]
    #[strum(to_string = "website review", serialize = "review")]
    Review,
    #[sqlx(rename = "deployment")]
    #[serde(rename = "deployment")]
    #[strum(to_string = "deployment")]
    Deployment,
    #[sqlx(rename = "offboarding")]
    #[serde(rename = "offboarding")]
    #[strum(to_string = "offboarding")]
    Offboarding,
}

impl TaskStage {
    /// The real stages in delivery order, without the `NotStarted` marker.
    pub const ORDERED: [TaskStage; 6] = [
        TaskStage::Onboarding,
        TaskStage::Design,
        TaskStage::Development,
        TaskStage::Review,
        TaskStage::Deployment,
        TaskStage::Offboarding,
    ];
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskStatus {
    Complete,
    #[default]
    Current,
    Upcoming,
}

/// Standalone task record. Shares its `id` with the snapshot embedded in the
/// owning project and with the task's message thread.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub display_id: i64, // Human-facing reference, 8 digits
    pub project_id: Uuid,
    pub title: String,
    pub stage: TaskStage,
    pub status: TaskStatus,
    pub details: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task fields as submitted by a client or copied from a template blueprint.
/// Every field may be missing; see [`TaskInput::into_snapshot`] for defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TaskInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_empty_as_none")]
    pub stage: Option<TaskStage>,
    #[serde(default, deserialize_with = "deserialize_empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub due_date: Option<NaiveDate>,
}

impl TaskInput {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Fill in defaults and attach the shared identifier.
    pub fn into_snapshot(self, id: Uuid, today: NaiveDate) -> TaskSnapshot {
        TaskSnapshot {
            id,
            title: self.title.unwrap_or_default(),
            stage: self.stage.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            details: self.details.unwrap_or_default(),
            start_date: self.start_date.unwrap_or(today),
            due_date: self.due_date.unwrap_or(today),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub display_id: i64,
    pub title: String,
    pub stage: TaskStage,
    pub status: TaskStatus,
    pub details: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub assignee_id: Option<Uuid>,
}

impl CreateTask {
    pub fn from_snapshot(project_id: Uuid, display_id: i64, snapshot: &TaskSnapshot) -> Self {
        Self {
            project_id,
            display_id,
            title: snapshot.title.clone(),
            stage: snapshot.stage,
            status: snapshot.status,
            details: snapshot.details.clone(),
            start_date: snapshot.start_date,
            due_date: snapshot.due_date,
            assignee_id: None,
        }
    }
}

/// Partial update applied to a task everywhere it is represented.
///
/// `assignee_id` and `message` only reach the standalone record and the
/// thread anchor; the embedded snapshot has no such fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_empty_as_none")]
    pub stage: Option<TaskStage>,
    #[serde(default, deserialize_with = "deserialize_empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_empty_as_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskUpdate {
    /// JSON merge patch for the embedded snapshot, holding only the fields
    /// present in this update. `None` when no snapshot field is touched.
    pub fn snapshot_patch(&self) -> Option<Value> {
        let mut patch = Map::new();
        if let Some(title) = &self.title {
            patch.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(stage) = self.stage {
            patch.insert("stage".into(), Value::from(stage.to_string()));
        }
        if let Some(status) = self.status {
            patch.insert("status".into(), Value::from(status.to_string()));
        }
        if let Some(details) = &self.details {
            patch.insert("details".into(), Value::from(details.as_str()));
        }
        if let Some(start_date) = self.start_date {
            patch.insert("start_date".into(), Value::from(start_date.to_string()));
        }
        if let Some(due_date) = self.due_date {
            patch.insert("due_date".into(), Value::from(due_date.to_string()));
        }
        (!patch.is_empty()).then_some(Value::Object(patch))
    }

    /// Whether the update carries fields mirrored on the thread anchor.
    pub fn touches_thread(&self) -> bool {
        self.assignee_id.is_some() || self.message.is_some()
    }
}

const TASK_COLUMNS: &str = "id, display_id, project_id, title, stage, status, details, start_date, due_date, assignee_id, created_at, updated_at";

impl Task {
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_project_id<'e, E>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn display_id_exists<'e, E>(executor: E, display_id: i64) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE display_id = $1")
            .bind(display_id)
            .fetch_one(executor)
            .await?;
        Ok(count > 0)
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"INSERT INTO tasks (id, display_id, project_id, title, stage, status, details, start_date, due_date, assignee_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(task_id)
        .bind(data.display_id)
        .bind(data.project_id)
        .bind(&data.title)
        .bind(data.stage)
        .bind(data.status)
        .bind(&data.details)
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(data.assignee_id)
        .fetch_one(executor)
        .await
    }

    /// Overwrite only the fields present in `update`. Returns `None` when no
    /// task has this id.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        update: &TaskUpdate,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(&format!(
            r#"UPDATE tasks
               SET title = COALESCE($2, title),
                   stage = COALESCE($3, stage),
                   status = COALESCE($4, status),
                   details = COALESCE($5, details),
                   start_date = COALESCE($6, start_date),
                   due_date = COALESCE($7, due_date),
                   assignee_id = COALESCE($8, assignee_id),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.stage)
        .bind(update.status)
        .bind(update.details.as_deref())
        .bind(update.start_date)
        .bind(update.due_date)
        .bind(update.assignee_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete `id` only when it belongs to `project_id`.
    pub async fn delete_in_project<'e, E>(
        executor: E,
        id: Uuid,
        project_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_project_id<'e, E>(executor: E, project_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE project_id = $1")
            .bind(project_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_stage_parsing_accepts_labels_and_aliases() {
        assert_eq!("design stage".parse::<TaskStage>().unwrap(), TaskStage::Design);
        assert_eq!("design".parse::<TaskStage>().unwrap(), TaskStage::Design);
        assert_eq!("Website Review".parse::<TaskStage>().unwrap(), TaskStage::Review);
        assert_eq!("not started".parse::<TaskStage>().unwrap(), TaskStage::NotStarted);
        assert!("qa".parse::<TaskStage>().is_err());
        assert_eq!(TaskStage::Onboarding.to_string(), "onboarding stage");
    }

    #[test]
    fn test_input_defaults() {
        let today = day(2025, 3, 14);
        let id = Uuid::new_v4();
        let snapshot = TaskInput::titled("Wireframes").into_snapshot(id, today);

        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.title, "Wireframes");
        assert_eq!(snapshot.stage, TaskStage::NotStarted);
        assert_eq!(snapshot.status, TaskStatus::Current);
        assert_eq!(snapshot.details, "");
        assert_eq!(snapshot.start_date, today);
        assert_eq!(snapshot.due_date, today);
    }

    #[test]
    fn test_input_from_browser_payload() {
        let input: TaskInput = serde_json::from_str(
            r#"{"title": "Logo", "stage": "", "status": "upcoming", "start_date": "4/1/2025", "due_date": ""}"#,
        )
        .unwrap();
        let snapshot = input.into_snapshot(Uuid::new_v4(), day(2025, 3, 14));

        assert_eq!(snapshot.stage, TaskStage::NotStarted);
        assert_eq!(snapshot.status, TaskStatus::Upcoming);
        assert_eq!(snapshot.start_date, day(2025, 4, 1));
        assert_eq!(snapshot.due_date, day(2025, 3, 14));
    }

    #[test]
    fn test_snapshot_patch_only_contains_present_fields() {
        let update = TaskUpdate {
            status: Some(TaskStatus::Complete),
            message: Some("done".into()),
            ..Default::default()
        };
        let patch = update.snapshot_patch().unwrap();
        assert_eq!(patch, serde_json::json!({ "status": "complete" }));
        assert!(update.touches_thread());

        let thread_only = TaskUpdate {
            assignee_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(thread_only.snapshot_patch().is_none());
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let project_id = Uuid::new_v4();
        let snapshot = TaskInput {
            title: Some("Sitemap".into()),
            stage: Some(TaskStage::Design),
            details: Some("All public pages".into()),
            ..Default::default()
        }
        .into_snapshot(Uuid::new_v4(), day(2025, 5, 1));

        let created = Task::create(
            &db.pool,
            &CreateTask::from_snapshot(project_id, 12345678, &snapshot),
            snapshot.id,
        )
        .await
        .unwrap();
        assert_eq!(created.display_id, 12345678);
        assert!(Task::display_id_exists(&db.pool, 12345678).await.unwrap());

        let updated = Task::update(
            &db.pool,
            snapshot.id,
            &TaskUpdate {
                status: Some(TaskStatus::Complete),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.status, TaskStatus::Complete);
        assert_eq!(updated.title, "Sitemap");
        assert_eq!(updated.stage, TaskStage::Design);
        assert_eq!(updated.details, "All public pages");
        assert_eq!(updated.start_date, day(2025, 5, 1));

        let missing = Task::update(&db.pool, Uuid::new_v4(), &TaskUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
