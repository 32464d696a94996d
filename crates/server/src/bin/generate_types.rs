use std::{env, fs, path::Path};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `generate_types`. Do not edit it by hand.\n";
    let decls: Vec<String> = vec![
        db::models::project::ProjectAssignee::decl(),
        db::models::project::TaskSnapshot::decl(),
        db::models::project::Project::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::project::StageProgress::decl(),
        db::models::task::TaskStage::decl(),
        db::models::task::TaskStatus::decl(),
        db::models::task::Task::decl(),
        db::models::task::TaskInput::decl(),
        db::models::task::TaskUpdate::decl(),
        db::models::task_message::TaskMessage::decl(),
        db::models::task_message::CreateTaskMessage::decl(),
        db::models::task_message::UpdateTaskMessage::decl(),
        db::models::task_message::TaskMessageFilter::decl(),
        db::models::template::Template::decl(),
        db::models::template::CreateTemplate::decl(),
        db::models::template::UpdateTemplate::decl(),
        db::models::template::TemplateTask::decl(),
        db::models::template::CreateTemplateTask::decl(),
        db::models::template::UpdateTemplateTask::decl(),
        services::services::project_tasks::AddProjectTask::decl(),
        services::services::project_tasks::UpdateProjectTask::decl(),
        services::services::project_tasks::DeleteProjectTask::decl(),
        services::services::project_tasks::AddedTask::decl(),
        services::services::project_tasks::UpdatedTask::decl(),
        services::services::project_tasks::DeletedTask::decl(),
        services::services::project_tasks::DeletedProject::decl(),
        services::services::reconciliation::MissingTask::decl(),
        services::services::reconciliation::MissingAnchor::decl(),
        services::services::reconciliation::ReconciliationReport::decl(),
        server::routes::templates::TemplateWithTasks::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| format!("export {}", decl.trim_start()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n{body}\n")
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        match fs::read_to_string(&types_path) {
            Ok(current) if current == generated => {
                println!("shared/types.ts is up to date.");
            }
            _ => {
                eprintln!("shared/types.ts is out of date. Run `cargo run --bin generate_types`.");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = fs::create_dir_all(&shared_path).and_then(|_| fs::write(&types_path, generated)) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("Wrote {}", types_path.display());
}
