use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metamodel::{GenerationTask, TaskLogEntry, TaskStatus, TaskSummary};

/// What `get_task_status` reports for one task
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TaskStatusReport {
    pub task_id: String,
    pub percentage: u8,
    pub status: TaskStatus,
    pub message: String,
    pub logs: Vec<TaskLogEntry>,
    pub result: Option<TaskSummary>,
    pub output_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

fn status_message(task: &GenerationTask) -> String {
    if let Some(error) = &task.error_msg {
        return error.clone();
    }
    if let Some(last) = task.logs.last() {
        return last.message.clone();
    }
    match task.status {
        TaskStatus::Pending => "Waiting to start".to_string(),
        TaskStatus::Running => format!("Running ({}%)", task.progress),
        TaskStatus::Completed => "Completed".to_string(),
        TaskStatus::Failed => "Failed".to_string(),
    }
}

impl From<&GenerationTask> for TaskStatusReport {
    fn from(task: &GenerationTask) -> Self {
        TaskStatusReport {
            task_id: task.id.clone(),
            percentage: task.progress,
            status: task.status,
            message: status_message(task),
            logs: task.logs.clone(),
            result: task.result.clone(),
            output_path: task.output_path.clone(),
            updated_at: task.updated_at,
        }
    }
}
