//! Detects and repairs drift between embedded task snapshots, standalone task
//! records and task message threads.
//!
//! The embedded task lists are the source of truth: a standalone task or a
//! message is orphaned when no project embeds its task id, and every embedded
//! task must have a standalone record and an anchor message.

use std::collections::HashSet;

use db::models::{
    project::{Project, TaskSnapshot},
    task::{CreateTask, Task},
    task_message::{CreateTaskMessage, TaskMessage},
};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::project_tasks::{ProjectTaskError, generate_display_id};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    ProjectTask(#[from] ProjectTaskError),
}

/// Embedded snapshot that has no standalone record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MissingTask {
    pub project_id: Uuid,
    pub snapshot: TaskSnapshot,
}

/// Embedded task whose thread has no anchor message.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MissingAnchor {
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub sender_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ReconciliationReport {
    /// Standalone tasks no project embeds.
    pub orphaned_tasks: Vec<Uuid>,
    /// Messages whose task no project embeds.
    pub orphaned_messages: Vec<Uuid>,
    pub missing_tasks: Vec<MissingTask>,
    pub missing_anchors: Vec<MissingAnchor>,
    /// Whether the issues above were fixed.
    pub repaired: bool,
}

impl ReconciliationReport {
    pub fn issue_count(&self) -> usize {
        self.orphaned_tasks.len()
            + self.orphaned_messages.len()
            + self.missing_tasks.len()
            + self.missing_anchors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}

pub struct ReconciliationService {
    pool: SqlitePool,
}

impl ReconciliationService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Report drift without changing anything.
    pub async fn scan(&self) -> Result<ReconciliationReport, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let report = scan_with(&mut *conn).await?;
        if !report.is_clean() {
            warn!(issues = report.issue_count(), "Task representations have drifted");
        }
        Ok(report)
    }

    /// Scan and fix every issue found, in one transaction.
    pub async fn repair(&self) -> Result<ReconciliationReport, ReconciliationError> {
        let mut tx = db::begin_write(&self.pool).await?;
        let mut report = scan_with(&mut *tx).await?;

        if report.is_clean() {
            tx.commit().await?;
            return Ok(report);
        }

        for task_id in &report.orphaned_tasks {
            Task::delete(&mut *tx, *task_id).await?;
        }
        for message_id in &report.orphaned_messages {
            TaskMessage::delete(&mut *tx, *message_id).await?;
        }
        for missing in &report.missing_tasks {
            let display_id = generate_display_id(&mut *tx).await?;
            Task::create(
                &mut *tx,
                &CreateTask::from_snapshot(missing.project_id, display_id, &missing.snapshot),
                missing.snapshot.id,
            )
            .await?;
        }
        for anchor in &report.missing_anchors {
            TaskMessage::create(
                &mut *tx,
                &CreateTaskMessage::anchor(
                    anchor.project_id,
                    anchor.task_id,
                    anchor.assignee_id,
                    Some(anchor.sender_id),
                ),
                Uuid::new_v4(),
                true,
            )
            .await?;
        }

        tx.commit().await?;
        report.repaired = true;
        info!(
            orphaned_tasks = report.orphaned_tasks.len(),
            orphaned_messages = report.orphaned_messages.len(),
            missing_tasks = report.missing_tasks.len(),
            missing_anchors = report.missing_anchors.len(),
            "Repaired task representations"
        );
        Ok(report)
    }
}

async fn scan_with(conn: &mut SqliteConnection) -> Result<ReconciliationReport, sqlx::Error> {
    let projects = Project::find_all(&mut *conn).await?;
    let tasks = Task::find_all(&mut *conn).await?;
    let messages = TaskMessage::find_all(&mut *conn).await?;

    let embedded: HashSet<Uuid> = projects
        .iter()
        .flat_map(|p| p.tasks.iter().map(|t| t.id))
        .collect();
    let standalone: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
    let anchored: HashSet<Uuid> = messages
        .iter()
        .filter(|m| m.is_anchor)
        .map(|m| m.task_id)
        .collect();

    let mut report = ReconciliationReport {
        orphaned_tasks: tasks
            .iter()
            .filter(|t| !embedded.contains(&t.id))
            .map(|t| t.id)
            .collect(),
        orphaned_messages: messages
            .iter()
            .filter(|m| !embedded.contains(&m.task_id))
            .map(|m| m.id)
            .collect(),
        ..Default::default()
    };

    for project in &projects {
        for snapshot in &project.tasks {
            if !standalone.contains(&snapshot.id) {
                report.missing_tasks.push(MissingTask {
                    project_id: project.id,
                    snapshot: snapshot.clone(),
                });
            }
            if !anchored.contains(&snapshot.id) {
                report.missing_anchors.push(MissingAnchor {
                    project_id: project.id,
                    task_id: snapshot.id,
                    assignee_id: project.first_assignee_id(),
                    sender_id: project.assigned_by,
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            project::{CreateProject, ProjectAssignee},
            task::TaskInput,
            template::{CreateTemplate, Template},
        },
    };

    use super::*;
    use crate::services::project_tasks::ProjectTaskService;

    async fn seeded() -> (DBService, Project) {
        let db = DBService::new_in_memory().await.unwrap();
        let template = Template::create(
            &db.pool,
            &CreateTemplate {
                name: "Landing page".into(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let project = ProjectTaskService::new(db.pool.clone())
            .create_project(CreateProject {
                name: "Website Redesign".into(),
                template_id: template.id,
                assignees: vec![ProjectAssignee {
                    id: Uuid::new_v4(),
                    name: "Sam".into(),
                }],
                assigned_by: Uuid::new_v4(),
                tasks: Some(vec![
                    TaskInput::titled("Wireframes"),
                    TaskInput::titled("Launch"),
                ]),
            })
            .await
            .unwrap();
        (db, project)
    }

    #[tokio::test]
    async fn test_consistent_data_is_clean() {
        let (db, _) = seeded().await;
        let service = ReconciliationService::new(db.pool.clone());

        let report = service.scan().await.unwrap();
        assert!(report.is_clean());

        let report = service.repair().await.unwrap();
        assert!(report.is_clean());
        assert!(!report.repaired);
    }

    #[tokio::test]
    async fn test_detects_and_repairs_each_kind_of_drift() {
        let (db, project) = seeded().await;
        let service = ReconciliationService::new(db.pool.clone());
        let wireframes = project.tasks[0].id;
        let launch = project.tasks[1].id;

        // Snapshot without a standalone record.
        Task::delete(&db.pool, wireframes).await.unwrap();
        // Snapshot without an anchor.
        TaskMessage::delete_by_task_id(&db.pool, launch).await.unwrap();
        // Standalone task and message no project embeds.
        let stray = TaskInput::titled("Stray").into_snapshot(Uuid::new_v4(), utils::date::today());
        Task::create(
            &db.pool,
            &CreateTask::from_snapshot(project.id, 11111111, &stray),
            stray.id,
        )
        .await
        .unwrap();
        let stray_message = TaskMessage::create(
            &db.pool,
            &CreateTaskMessage::anchor(project.id, stray.id, None, None),
            Uuid::new_v4(),
            true,
        )
        .await
        .unwrap();

        let report = service.scan().await.unwrap();
        assert_eq!(report.orphaned_tasks, vec![stray.id]);
        assert_eq!(report.orphaned_messages, vec![stray_message.id]);
        assert_eq!(report.missing_tasks.len(), 1);
        assert_eq!(report.missing_tasks[0].snapshot.id, wireframes);
        assert_eq!(report.missing_anchors.len(), 1);
        assert_eq!(report.missing_anchors[0].task_id, launch);
        assert!(!report.repaired);

        let report = service.repair().await.unwrap();
        assert!(report.repaired);
        assert_eq!(report.issue_count(), 4);

        assert!(service.scan().await.unwrap().is_clean());
        let restored = Task::find_by_id(&db.pool, wireframes).await.unwrap().unwrap();
        assert_eq!(restored.title, "Wireframes");
        assert_eq!(restored.project_id, project.id);
        assert!(Task::find_by_id(&db.pool, stray.id).await.unwrap().is_none());

        let anchor = TaskMessage::find_anchor(&db.pool, launch).await.unwrap().unwrap();
        assert_eq!(anchor.sender_id, Some(project.assigned_by));
        assert_eq!(anchor.assignee_id, project.first_assignee_id());
    }
}
