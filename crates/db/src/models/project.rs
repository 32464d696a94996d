use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, types::Json};
use ts_rs::TS;
use uuid::Uuid;

use super::task::{TaskInput, TaskStage, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ProjectAssignee {
    pub id: Uuid,
    pub name: String,
}

/// Copy of a task embedded in its project's task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub title: String,
    pub stage: TaskStage,
    pub status: TaskStatus,
    pub details: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub template_id: Uuid,
    #[sqlx(json)]
    pub assignees: Vec<ProjectAssignee>,
    #[sqlx(json)]
    pub tasks: Vec<TaskSnapshot>,
    pub assigned_by: Uuid, // Owner who created the project and sends the first message of each task
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub template_id: Uuid,
    #[serde(default)]
    pub assignees: Vec<ProjectAssignee>,
    pub assigned_by: Uuid,
    /// `None` copies the template's blueprint tasks; `Some(vec![])` creates
    /// a project without tasks.
    #[serde(default)]
    pub tasks: Option<Vec<TaskInput>>,
}

/// Editable project fields. The task list is deliberately absent: it only
/// changes through the task operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub assignees: Option<Vec<ProjectAssignee>>,
    pub assigned_by: Option<Uuid>,
}

/// Completion of one stage, as shown on the project progress bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StageProgress {
    pub stage: TaskStage,
    pub total: usize,
    pub completed: usize,
    pub status: TaskStatus,
}

const PROJECT_COLUMNS: &str =
    "id, name, template_id, assignees, tasks, assigned_by, created_at, updated_at";

/// Path of the embedded element whose `id` equals `$1`.
const ELEMENT_PATH: &str =
    "(SELECT e.fullkey FROM json_each(projects.tasks) AS e WHERE json_extract(e.value, '$.id') = $1)";

impl Project {
    pub fn first_assignee_id(&self) -> Option<Uuid> {
        self.assignees.first().map(|a| a.id)
    }

    pub fn find_task(&self, task_id: Uuid) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Per-stage counts in delivery order. A stage with no tasks is
    /// `upcoming`, one whose tasks are all complete is `complete`, anything
    /// else is `current`. Tasks without a stage are not counted.
    pub fn stage_progress(&self) -> Vec<StageProgress> {
        TaskStage::ORDERED
            .iter()
            .map(|&stage| {
                let in_stage = self.tasks.iter().filter(|t| t.stage == stage);
                let total = in_stage.clone().count();
                let completed = in_stage
                    .filter(|t| t.status == TaskStatus::Complete)
                    .count();
                let status = match (total, completed) {
                    (0, _) => TaskStatus::Upcoming,
                    (t, c) if t == c => TaskStatus::Complete,
                    _ => TaskStatus::Current,
                };
                StageProgress {
                    stage,
                    total,
                    completed,
                    status,
                }
            })
            .collect()
    }

    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Insert the project with an empty task list.
    pub async fn create<'e, E>(
        executor: E,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Project>(&format!(
            r#"INSERT INTO projects (id, name, template_id, assignees, tasks, assigned_by)
               VALUES ($1, $2, $3, $4, '[]', $5)
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(project_id)
        .bind(&data.name)
        .bind(data.template_id)
        .bind(Json(&data.assignees))
        .bind(data.assigned_by)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Project>(&format!(
            r#"UPDATE projects
               SET name = COALESCE($2, name),
                   assignees = COALESCE($3, assignees),
                   assigned_by = COALESCE($4, assigned_by),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {PROJECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.name.as_deref())
        .bind(data.assignees.as_ref().map(Json))
        .bind(data.assigned_by)
        .fetch_optional(executor)
        .await
    }

    /// Overwrite the whole embedded task list.
    pub async fn replace_tasks<'e, E>(
        executor: E,
        id: Uuid,
        tasks: &[TaskSnapshot],
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE projects SET tasks = $2, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .bind(Json(tasks))
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Append one snapshot inside the database, without reading the list.
    pub async fn append_task<'e, E>(
        executor: E,
        id: Uuid,
        task: &TaskSnapshot,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let json = serde_json::to_string(task).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        let result = sqlx::query(
            r#"UPDATE projects
               SET tasks = json_insert(tasks, '$[#]', json($2)),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(json)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Merge `patch` into the embedded snapshot with id `task_id`, in
    /// whichever project holds it. Fields absent from the patch are kept.
    pub async fn patch_task<'e, E>(
        executor: E,
        task_id: Uuid,
        patch: &serde_json::Value,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(&format!(
            r#"UPDATE projects
               SET tasks = json_set(
                       tasks,
                       {ELEMENT_PATH},
                       json_patch(json_extract(tasks, {ELEMENT_PATH}), json($2))
                   ),
                   updated_at = datetime('now', 'subsec')
               WHERE EXISTS {ELEMENT_PATH}"#
        ))
        .bind(task_id.to_string())
        .bind(patch.to_string())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Pull the snapshot with id `task_id` out of the project's list.
    pub async fn remove_task<'e, E>(
        executor: E,
        id: Uuid,
        task_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(&format!(
            r#"UPDATE projects
               SET tasks = json_remove(tasks, {ELEMENT_PATH}),
                   updated_at = datetime('now', 'subsec')
               WHERE id = $2 AND EXISTS {ELEMENT_PATH}"#
        ))
        .bind(task_id.to_string())
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn snapshot(title: &str, stage: TaskStage, status: TaskStatus) -> TaskSnapshot {
        TaskInput {
            title: Some(title.into()),
            stage: Some(stage),
            status: Some(status),
            ..Default::default()
        }
        .into_snapshot(Uuid::new_v4(), today())
    }

    async fn insert_project(db: &DBService) -> Project {
        let data = CreateProject {
            name: "Website Redesign".into(),
            template_id: Uuid::new_v4(),
            assignees: vec![ProjectAssignee {
                id: Uuid::new_v4(),
                name: "Dana".into(),
            }],
            assigned_by: Uuid::new_v4(),
            tasks: None,
        };
        Project::create(&db.pool, &data, Uuid::new_v4()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_starts_with_empty_task_list() {
        let db = DBService::new_in_memory().await.unwrap();
        let project = insert_project(&db).await;

        assert!(project.tasks.is_empty());
        assert_eq!(project.assignees.len(), 1);
        assert_eq!(project.first_assignee_id(), Some(project.assignees[0].id));
    }

    #[tokio::test]
    async fn test_append_patch_and_remove_embedded_tasks() {
        let db = DBService::new_in_memory().await.unwrap();
        let project = insert_project(&db).await;
        let first = snapshot("Kickoff call", TaskStage::Onboarding, TaskStatus::Current);
        let second = snapshot("Wireframes", TaskStage::Design, TaskStatus::Upcoming);

        Project::append_task(&db.pool, project.id, &first).await.unwrap();
        Project::append_task(&db.pool, project.id, &second).await.unwrap();

        let patch = serde_json::json!({ "status": "complete" });
        let patched = Project::patch_task(&db.pool, second.id, &patch).await.unwrap();
        assert_eq!(patched, 1);

        let reloaded = Project::find_by_id(&db.pool, project.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tasks.len(), 2);
        assert_eq!(reloaded.tasks[0], first);
        let wireframes = reloaded.find_task(second.id).unwrap();
        assert_eq!(wireframes.status, TaskStatus::Complete);
        assert_eq!(wireframes.title, "Wireframes");
        assert_eq!(wireframes.stage, TaskStage::Design);

        let removed = Project::remove_task(&db.pool, project.id, first.id).await.unwrap();
        assert_eq!(removed, 1);
        let reloaded = Project::find_by_id(&db.pool, project.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tasks.len(), 1);
        assert_eq!(reloaded.tasks[0].id, second.id);

        // Unknown ids leave the list alone instead of nulling it.
        let removed = Project::remove_task(&db.pool, project.id, Uuid::new_v4()).await.unwrap();
        assert_eq!(removed, 0);
        let untouched = Project::patch_task(&db.pool, Uuid::new_v4(), &patch).await.unwrap();
        assert_eq!(untouched, 0);
        let reloaded = Project::find_by_id(&db.pool, project.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_task_list() {
        let db = DBService::new_in_memory().await.unwrap();
        let project = insert_project(&db).await;
        let task = snapshot("Content audit", TaskStage::Development, TaskStatus::Current);
        Project::replace_tasks(&db.pool, project.id, std::slice::from_ref(&task))
            .await
            .unwrap();

        let updated = Project::update(
            &db.pool,
            project.id,
            &UpdateProject {
                name: Some("Website Redesign v2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.name, "Website Redesign v2");
        assert_eq!(updated.assignees, project.assignees);
        assert_eq!(updated.tasks, vec![task]);
    }

    #[test]
    fn test_stage_progress() {
        let project = Project {
            id: Uuid::new_v4(),
            name: "Storefront".into(),
            template_id: Uuid::new_v4(),
            assignees: vec![],
            tasks: vec![
                snapshot("Kickoff", TaskStage::Onboarding, TaskStatus::Complete),
                snapshot("Access", TaskStage::Onboarding, TaskStatus::Complete),
                snapshot("Moodboard", TaskStage::Design, TaskStatus::Complete),
                snapshot("Mockups", TaskStage::Design, TaskStatus::Current),
                snapshot("Unsorted", TaskStage::NotStarted, TaskStatus::Current),
            ],
            assigned_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let progress = project.stage_progress();
        assert_eq!(progress.len(), TaskStage::ORDERED.len());
        assert_eq!(progress[0].stage, TaskStage::Onboarding);
        assert_eq!((progress[0].total, progress[0].completed), (2, 2));
        assert_eq!(progress[0].status, TaskStatus::Complete);
        assert_eq!((progress[1].total, progress[1].completed), (2, 1));
        assert_eq!(progress[1].status, TaskStatus::Current);
        assert!(
            progress[2..]
                .iter()
                .all(|p| p.total == 0 && p.status == TaskStatus::Upcoming)
        );
    }
}
