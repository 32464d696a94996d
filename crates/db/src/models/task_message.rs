use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// A message in a task's thread. Every task gets one anchor message (empty
/// text, no files) when it is created; user messages are appended after it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TaskMessage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub message: String,
    #[sqlx(json)]
    pub files: Vec<String>,
    pub is_anchor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTaskMessage {
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub files: Vec<String>,
}

impl CreateTaskMessage {
    pub fn anchor(
        project_id: Uuid,
        task_id: Uuid,
        assignee_id: Option<Uuid>,
        sender_id: Option<Uuid>,
    ) -> Self {
        Self {
            project_id,
            task_id,
            assignee_id,
            sender_id,
            message: String::new(),
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTaskMessage {
    pub assignee_id: Option<Uuid>,
    pub message: Option<String>,
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TaskMessageFilter {
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

const MESSAGE_COLUMNS: &str = "id, project_id, task_id, assignee_id, sender_id, message, files, is_anchor, created_at, updated_at";

impl TaskMessage {
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM task_messages ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(executor)
        .await
    }

    /// Newest first. Unset filter fields match everything.
    pub async fn find_filtered<'e, E>(
        executor: E,
        filter: &TaskMessageFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            r#"SELECT {MESSAGE_COLUMNS}
               FROM task_messages
               WHERE ($1 IS NULL OR project_id = $1)
                 AND ($2 IS NULL OR task_id = $2)
               ORDER BY created_at DESC, rowid DESC"#
        ))
        .bind(filter.project_id)
        .bind(filter.task_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM task_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_anchor<'e, E>(executor: E, task_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            r#"SELECT {MESSAGE_COLUMNS}
               FROM task_messages
               WHERE task_id = $1 AND is_anchor = 1
               ORDER BY created_at ASC, rowid ASC
               LIMIT 1"#
        ))
        .bind(task_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateTaskMessage,
        message_id: Uuid,
        is_anchor: bool,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            r#"INSERT INTO task_messages (id, project_id, task_id, assignee_id, sender_id, message, files, is_anchor)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {MESSAGE_COLUMNS}"#
        ))
        .bind(message_id)
        .bind(data.project_id)
        .bind(data.task_id)
        .bind(data.assignee_id)
        .bind(data.sender_id)
        .bind(&data.message)
        .bind(Json(&data.files))
        .bind(is_anchor)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateTaskMessage,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskMessage>(&format!(
            r#"UPDATE task_messages
               SET assignee_id = COALESCE($2, assignee_id),
                   message = COALESCE($3, message),
                   files = COALESCE($4, files),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {MESSAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.assignee_id)
        .bind(data.message.as_deref())
        .bind(data.files.as_ref().map(Json))
        .fetch_optional(executor)
        .await
    }

    /// Mirror assignee/message changes onto the task's anchor message.
    /// Fields passed as `None` keep their current value.
    pub async fn update_anchor<'e, E>(
        executor: E,
        task_id: Uuid,
        assignee_id: Option<Uuid>,
        message: Option<&str>,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"UPDATE task_messages
               SET assignee_id = COALESCE($2, assignee_id),
                   message = COALESCE($3, message),
                   updated_at = datetime('now', 'subsec')
               WHERE task_id = $1 AND is_anchor = 1"#,
        )
        .bind(task_id)
        .bind(assignee_id)
        .bind(message)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM task_messages WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete the whole thread of a task, anchor included.
    pub async fn delete_by_task_id<'e, E>(executor: E, task_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM task_messages WHERE task_id = $1")
            .bind(task_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete a task's thread within one project.
    pub async fn delete_thread_in_project<'e, E>(
        executor: E,
        project_id: Uuid,
        task_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result =
            sqlx::query("DELETE FROM task_messages WHERE project_id = $1 AND task_id = $2")
                .bind(project_id)
                .bind(task_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_project_id<'e, E>(
        executor: E,
        project_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM task_messages WHERE project_id = $1")
            .bind(project_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
