use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite};
use ts_rs::TS;
use utils::date::{deserialize_empty_as_none, deserialize_optional_date};
use uuid::Uuid;

use super::task::{TaskInput, TaskStage, TaskStatus};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTemplate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateTemplate {
    pub name: String,
}

/// Blueprint task owned by a template, copied into projects created from it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TemplateTask {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: String,
    pub task_type: String,
    pub stage: Option<TaskStage>,
    pub status: Option<TaskStatus>,
    pub details: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateTask {
    pub fn to_task_input(&self) -> TaskInput {
        TaskInput {
            title: Some(self.title.clone()),
            stage: self.stage,
            status: self.status,
            details: Some(self.details.clone()),
            start_date: self.start_date,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTemplateTask {
    pub title: String,
    #[serde(default)]
    pub task_type: Option<String>,
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
    #[serde(default)]
    pub image: Option<String>,
}

impl CreateTemplateTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            task_type: None,
            stage: None,
            status: None,
            details: None,
            start_date: None,
            due_date: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTemplateTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
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
    #[serde(default)]
    pub image: Option<String>,
}

const TEMPLATE_TASK_COLUMNS: &str = "id, template_id, title, task_type, stage, status, details, start_date, due_date, image, created_at, updated_at";

impl Template {
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Template>(
            "SELECT id, name, created_at, updated_at FROM templates ORDER BY name ASC",
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Template>(
            "SELECT id, name, created_at, updated_at FROM templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateTemplate,
        template_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Template>(
            r#"INSERT INTO templates (id, name) VALUES ($1, $2)
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(template_id)
        .bind(&data.name)
        .fetch_one(executor)
        .await
    }

    pub async fn rename<'e, E>(
        executor: E,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Template>(
            r#"UPDATE templates SET name = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TemplateTask {
    /// Blueprints in the order they were added to the template.
    pub async fn find_by_template_id<'e, E>(
        executor: E,
        template_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TemplateTask>(&format!(
            r#"SELECT {TEMPLATE_TASK_COLUMNS}
               FROM template_tasks
               WHERE template_id = $1
               ORDER BY created_at ASC, rowid ASC"#
        ))
        .bind(template_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TemplateTask>(&format!(
            "SELECT {TEMPLATE_TASK_COLUMNS} FROM template_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        template_id: Uuid,
        data: &CreateTemplateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TemplateTask>(&format!(
            r#"INSERT INTO template_tasks (id, template_id, title, task_type, stage, status, details, start_date, due_date, image)
               VALUES ($1, $2, $3, COALESCE($4, 'team'), $5, $6, COALESCE($7, ''), $8, $9, $10)
               RETURNING {TEMPLATE_TASK_COLUMNS}"#
        ))
        .bind(task_id)
        .bind(template_id)
        .bind(&data.title)
        .bind(data.task_type.as_deref())
        .bind(data.stage)
        .bind(data.status)
        .bind(data.details.as_deref())
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(data.image.as_deref())
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateTemplateTask,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TemplateTask>(&format!(
            r#"UPDATE template_tasks
               SET title = COALESCE($2, title),
                   task_type = COALESCE($3, task_type),
                   stage = COALESCE($4, stage),
                   status = COALESCE($5, status),
                   details = COALESCE($6, details),
                   start_date = COALESCE($7, start_date),
                   due_date = COALESCE($8, due_date),
                   image = COALESCE($9, image),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {TEMPLATE_TASK_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.as_deref())
        .bind(data.task_type.as_deref())
        .bind(data.stage)
        .bind(data.status)
        .bind(data.details.as_deref())
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(data.image.as_deref())
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM template_tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_template_id<'e, E>(
        executor: E,
        template_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM template_tasks WHERE template_id = $1")
            .bind(template_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_blueprints_keep_insertion_order() {
        let db = DBService::new_in_memory().await.unwrap();
        let template = Template::create(
            &db.pool,
            &CreateTemplate {
                name: "Marketing site".into(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        for title in ["Kickoff", "Wireframes", "Launch"] {
            TemplateTask::create(
                &db.pool,
                template.id,
                &CreateTemplateTask::titled(title),
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        }

        let blueprints = TemplateTask::find_by_template_id(&db.pool, template.id)
            .await
            .unwrap();
        let titles: Vec<_> = blueprints.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Kickoff", "Wireframes", "Launch"]);
        assert_eq!(blueprints[0].task_type, "team");
        assert_eq!(blueprints[0].details, "");
        assert!(blueprints[0].stage.is_none());

        let input = blueprints[1].to_task_input();
        assert_eq!(input.title.as_deref(), Some("Wireframes"));
        assert!(input.status.is_none());
    }

    #[tokio::test]
    async fn test_blueprint_partial_update() {
        let db = DBService::new_in_memory().await.unwrap();
        let blueprint = TemplateTask::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateTemplateTask::titled("Content plan"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let updated = TemplateTask::update(
            &db.pool,
            blueprint.id,
            &UpdateTemplateTask {
                stage: Some(TaskStage::Development),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.stage, Some(TaskStage::Development));
        assert_eq!(updated.title, "Content plan");
    }
}
