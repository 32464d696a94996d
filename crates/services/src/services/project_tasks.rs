//! Keeps the three representations of a task in step: the snapshot embedded
//! in its project, the standalone task record and the anchor message that
//! opens the task's thread.
//!
//! Every operation runs in a single transaction so a failure part-way through
//! leaves no partial writes behind.

use db::models::{
    project::{CreateProject, Project, TaskSnapshot},
    task::{CreateTask, Task, TaskInput, TaskUpdate},
    task_message::{CreateTaskMessage, TaskMessage},
    template::{Template, TemplateTask},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

/// Display ids are drawn from the 8-digit range.
const DISPLAY_ID_RANGE: std::ops::Range<i64> = 10_000_000..100_000_000;
const DISPLAY_ID_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum ProjectTaskError {
    #[error("{0}")]
    Validation(String),
    #[error("project not found")]
    ProjectNotFound,
    #[error("task not found")]
    TaskNotFound,
    #[error("template not found")]
    TemplateNotFound,
    #[error("could not allocate a unique display id after {0} attempts")]
    DisplayIdExhausted(usize),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AddProjectTask {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub task: Option<TaskInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProjectTask {
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub updates: Option<TaskUpdate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct DeleteProjectTask {
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddedTask {
    pub task_id: Uuid,
    pub display_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdatedTask {
    pub task_id: Uuid,
    /// Standalone record after the update, if one exists.
    pub task: Option<Task>,
    pub snapshot_updated: bool,
    pub anchor_updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DeletedTask {
    pub task_id: Uuid,
    pub snapshot_removed: bool,
    pub messages_deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DeletedProject {
    pub project_id: Uuid,
    pub tasks_deleted: u64,
    pub messages_deleted: u64,
}

pub struct ProjectTaskService {
    pool: SqlitePool,
}

impl ProjectTaskService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a project and every task record that hangs off it.
    ///
    /// When `data.tasks` is `None` the template's blueprints are used. An
    /// explicit empty list creates a project with no tasks.
    pub async fn create_project(&self, data: CreateProject) -> Result<Project, ProjectTaskError> {
        if data.name.trim().is_empty() {
            return Err(ProjectTaskError::Validation(
                "project name is required".to_string(),
            ));
        }

        let mut tx = db::begin_write(&self.pool).await?;

        let template = Template::find_by_id(&mut *tx, data.template_id)
            .await?
            .ok_or(ProjectTaskError::TemplateNotFound)?;

        let inputs: Vec<TaskInput> = match &data.tasks {
            Some(tasks) => tasks.clone(),
            None => TemplateTask::find_by_template_id(&mut *tx, template.id)
                .await?
                .iter()
                .map(TemplateTask::to_task_input)
                .collect(),
        };

        let project_id = Uuid::new_v4();
        let project = Project::create(&mut *tx, &data, project_id).await?;

        if inputs.is_empty() {
            tx.commit().await?;
            info!(project_id = %project_id, task_count = 0, "Created project");
            return Ok(project);
        }

        let today = utils::date::today();
        let mut snapshots = Vec::with_capacity(inputs.len());
        for input in inputs {
            let snapshot = input.into_snapshot(Uuid::new_v4(), today);
            insert_task_records(&mut *tx, &project, &snapshot).await?;
            snapshots.push(snapshot);
        }

        Project::replace_tasks(&mut *tx, project_id, &snapshots).await?;
        let project = Project::find_by_id(&mut *tx, project_id)
            .await?
            .ok_or(ProjectTaskError::ProjectNotFound)?;

        tx.commit().await?;
        info!(
            project_id = %project_id,
            template_id = %template.id,
            task_count = snapshots.len(),
            "Created project"
        );
        Ok(project)
    }

    pub async fn add_task(&self, request: AddProjectTask) -> Result<AddedTask, ProjectTaskError> {
        let (Some(project_id), Some(input)) = (request.project_id, request.task) else {
            return Err(ProjectTaskError::Validation(
                "project_id and task are required".to_string(),
            ));
        };

        let mut tx = db::begin_write(&self.pool).await?;
        let project = Project::find_by_id(&mut *tx, project_id)
            .await?
            .ok_or(ProjectTaskError::ProjectNotFound)?;

        let snapshot = input.into_snapshot(Uuid::new_v4(), utils::date::today());
        let task = insert_task_records(&mut *tx, &project, &snapshot).await?;
        Project::append_task(&mut *tx, project_id, &snapshot).await?;

        tx.commit().await?;
        info!(
            project_id = %project_id,
            task_id = %task.id,
            display_id = task.display_id,
            "Added task to project"
        );
        Ok(AddedTask {
            task_id: task.id,
            display_id: task.display_id,
        })
    }

    pub async fn update_task(
        &self,
        request: UpdateProjectTask,
    ) -> Result<UpdatedTask, ProjectTaskError> {
        let (Some(task_id), Some(updates)) = (request.task_id, request.updates) else {
            return Err(ProjectTaskError::Validation(
                "task_id and updates are required".to_string(),
            ));
        };

        let mut tx = db::begin_write(&self.pool).await?;

        let task = Task::update(&mut *tx, task_id, &updates).await?;
        let snapshot_updated = match updates.snapshot_patch() {
            Some(patch) => Project::patch_task(&mut *tx, task_id, &patch).await? > 0,
            None => false,
        };

        if task.is_none() && !snapshot_updated && !project_holds_task(&mut *tx, task_id).await? {
            return Err(ProjectTaskError::TaskNotFound);
        }

        let anchor_updated = if updates.touches_thread() {
            TaskMessage::update_anchor(
                &mut *tx,
                task_id,
                updates.assignee_id,
                updates.message.as_deref(),
            )
            .await?
                > 0
        } else {
            false
        };

        tx.commit().await?;
        if task.is_none() {
            warn!(task_id = %task_id, "Updated embedded task without a standalone record");
        }
        info!(
            task_id = %task_id,
            snapshot_updated,
            anchor_updated,
            "Updated task"
        );
        Ok(UpdatedTask {
            task_id,
            task,
            snapshot_updated,
            anchor_updated,
        })
    }

    pub async fn delete_task(
        &self,
        request: DeleteProjectTask,
    ) -> Result<DeletedTask, ProjectTaskError> {
        let (Some(task_id), Some(project_id)) = (request.task_id, request.project_id) else {
            return Err(ProjectTaskError::Validation(
                "task_id and project_id are required".to_string(),
            ));
        };

        let mut tx = db::begin_write(&self.pool).await?;
        let project = Project::find_by_id(&mut *tx, project_id)
            .await?
            .ok_or(ProjectTaskError::ProjectNotFound)?;

        let embedded = project.find_task(task_id).is_some();
        let standalone = Task::find_by_id(&mut *tx, task_id)
            .await?
            .is_some_and(|task| task.project_id == project_id);
        if !embedded && !standalone {
            return Err(ProjectTaskError::TaskNotFound);
        }

        let tasks_deleted = Task::delete_in_project(&mut *tx, task_id, project_id).await?;
        let snapshot_removed = Project::remove_task(&mut *tx, project_id, task_id).await? > 0;
        let messages_deleted =
            TaskMessage::delete_thread_in_project(&mut *tx, project_id, task_id).await?;

        tx.commit().await?;
        if tasks_deleted == 0 || !snapshot_removed {
            warn!(
                task_id = %task_id,
                tasks_deleted,
                snapshot_removed,
                "Deleted a task that was missing one of its representations"
            );
        }
        info!(
            project_id = %project_id,
            task_id = %task_id,
            messages_deleted,
            "Deleted task"
        );
        Ok(DeletedTask {
            task_id,
            snapshot_removed,
            messages_deleted,
        })
    }

    /// Delete a project with all of its tasks and messages.
    pub async fn delete_project(&self, project_id: Uuid) -> Result<DeletedProject, ProjectTaskError> {
        let mut tx = db::begin_write(&self.pool).await?;

        if Project::delete(&mut *tx, project_id).await? == 0 {
            return Err(ProjectTaskError::ProjectNotFound);
        }
        let tasks_deleted = Task::delete_by_project_id(&mut *tx, project_id).await?;
        let messages_deleted = TaskMessage::delete_by_project_id(&mut *tx, project_id).await?;

        tx.commit().await?;
        info!(
            project_id = %project_id,
            tasks_deleted,
            messages_deleted,
            "Deleted project"
        );
        Ok(DeletedProject {
            project_id,
            tasks_deleted,
            messages_deleted,
        })
    }
}

/// Insert the standalone task and its anchor message for `snapshot`.
async fn insert_task_records(
    conn: &mut SqliteConnection,
    project: &Project,
    snapshot: &TaskSnapshot,
) -> Result<Task, ProjectTaskError> {
    let display_id = generate_display_id(conn).await?;
    let task = Task::create(
        &mut *conn,
        &CreateTask::from_snapshot(project.id, display_id, snapshot),
        snapshot.id,
    )
    .await?;

    let anchor = CreateTaskMessage::anchor(
        project.id,
        snapshot.id,
        project.first_assignee_id(),
        Some(project.assigned_by),
    );
    TaskMessage::create(&mut *conn, &anchor, Uuid::new_v4(), true).await?;

    debug!(
        project_id = %project.id,
        task_id = %task.id,
        display_id,
        "Inserted task records"
    );
    Ok(task)
}

/// Draw random 8-digit ids until one is unused.
pub async fn generate_display_id(conn: &mut SqliteConnection) -> Result<i64, ProjectTaskError> {
    for _ in 0..DISPLAY_ID_ATTEMPTS {
        let candidate = rand::thread_rng().gen_range(DISPLAY_ID_RANGE);
        if !Task::display_id_exists(&mut *conn, candidate).await? {
            return Ok(candidate);
        }
        debug!(display_id = candidate, "Display id collision");
    }
    Err(ProjectTaskError::DisplayIdExhausted(DISPLAY_ID_ATTEMPTS))
}

async fn project_holds_task(
    conn: &mut SqliteConnection,
    task_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*)
           FROM projects, json_each(projects.tasks) AS e
           WHERE json_extract(e.value, '$.id') = $1"#,
    )
    .bind(task_id.to_string())
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}
