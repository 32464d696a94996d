pub mod project;
pub mod task;
pub mod task_message;
pub mod template;
