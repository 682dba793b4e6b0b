//! Generation task record and its state machine
//!
//! ```text
//!            start            complete
//! PENDING ─────────▶ RUNNING ─────────▶ COMPLETED
//!    ▲                  │                   │
//!    │                  │ fail              │
//!    │                  ▼                   │
//!    └──── restart ── FAILED ◀──────────────┘ (restart)
//! ```
//!
//! The record is only ever mutated by the actor that owns it; see
//! [`crate::task`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::config_value::ConfigValue;
use crate::errors::{TaskError, TaskResult};
use crate::options::GenerationOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Entity,
    Api,
    FullProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warning,
    Success,
    Error,
    Debug,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// What a generation task was asked to do
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TaskSettings {
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub template_ids: Vec<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub options: GenerationOptions,
}

pub type TaskConfig = ConfigValue<TaskSettings>;

/// Summary stored on a completed task
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TaskSummary {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_size: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationTask {
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub config: TaskConfig,
    pub progress: u8,
    pub result: Option<TaskSummary>,
    pub error_msg: Option<String>,
    pub output_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<TaskLogEntry>,
}

impl GenerationTask {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        task_type: TaskType,
        config: TaskConfig,
    ) -> TaskResult<Self> {
        let project_id = project_id.into();
        let name = name.into();
        if project_id.trim().is_empty() {
            return Err(TaskError::MissingAttribute("project_id"));
        }
        if name.trim().is_empty() {
            return Err(TaskError::MissingAttribute("name"));
        }
        let now = Utc::now();
        Ok(GenerationTask {
            id: Uuid::new_v4().to_string(),
            project_id,
            name,
            task_type,
            status: TaskStatus::Pending,
            config,
            progress: 0,
            result: None,
            error_msg: None,
            output_path: None,
            created_at: now,
            updated_at: now,
            logs: Vec::new(),
        })
    }

    fn ensure(&self, expected: &[TaskStatus], action: &'static str) -> TaskResult<()> {
        if expected.contains(&self.status) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self) -> TaskResult<()> {
        self.ensure(&[TaskStatus::Pending], "start")?;
        self.status = TaskStatus::Running;
        self.progress = 0;
        self.touch();
        Ok(())
    }

    pub fn update_progress(&mut self, progress: i64) -> TaskResult<()> {
        self.ensure(&[TaskStatus::Running], "update progress of")?;
        if !(0..=100).contains(&progress) {
            return Err(TaskError::ProgressOutOfRange(progress));
        }
        self.progress = progress as u8;
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, result: TaskSummary, output_path: Option<String>) -> TaskResult<()> {
        self.ensure(&[TaskStatus::Running], "complete")?;
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.output_path = output_path;
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> TaskResult<()> {
        self.ensure(&[TaskStatus::Running], "fail")?;
        self.status = TaskStatus::Failed;
        self.error_msg = Some(message.into());
        self.touch();
        Ok(())
    }

    pub fn restart(&mut self) -> TaskResult<()> {
        self.ensure(&[TaskStatus::Completed, TaskStatus::Failed], "restart")?;
        self.status = TaskStatus::Pending;
        self.progress = 0;
        self.result = None;
        self.error_msg = None;
        self.output_path = None;
        self.touch();
        Ok(())
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(TaskLogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> GenerationTask {
        GenerationTask::new("p1", "Generate users", TaskType::Entity, TaskConfig::default())
            .expect("valid task")
    }

    #[test]
    fn test_requires_project_and_name() {
        assert_eq!(
            GenerationTask::new("", "x", TaskType::Api, TaskConfig::default()),
            Err(TaskError::MissingAttribute("project_id"))
        );
        assert_eq!(
            GenerationTask::new("p1", " ", TaskType::Api, TaskConfig::default()),
            Err(TaskError::MissingAttribute("name"))
        );
    }

    #[test]
    fn test_happy_path() {
        let mut t = task();
        let created = t.updated_at;
        t.start().expect("start");
        assert_eq!(t.status, TaskStatus::Running);
        assert!(t.updated_at >= created);
        t.update_progress(40).expect("progress");
        assert_eq!(t.progress, 40);
        t.complete(TaskSummary::default(), Some("out".into()))
            .expect("complete");
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.progress, 100);
        assert_eq!(t.output_path.as_deref(), Some("out"));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut t = task();
        assert_eq!(
            t.complete(TaskSummary::default(), None),
            Err(TaskError::InvalidTransition {
                from: TaskStatus::Pending,
                action: "complete"
            })
        );
        assert!(t.update_progress(10).is_err());
        assert!(t.fail("boom").is_err());
        assert!(t.restart().is_err());

        t.start().expect("start");
        assert!(t.start().is_err());
        assert_eq!(t.update_progress(101), Err(TaskError::ProgressOutOfRange(101)));
        assert_eq!(t.update_progress(-1), Err(TaskError::ProgressOutOfRange(-1)));
    }

    #[test]
    fn test_restart_clears_outcome() {
        let mut t = task();
        t.start().expect("start");
        t.update_progress(70).expect("progress");
        t.fail("template error").expect("fail");
        assert_eq!(t.error_msg.as_deref(), Some("template error"));
        assert!(t.update_progress(80).is_err());

        t.restart().expect("restart");
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.progress, 0);
        assert!(t.error_msg.is_none());
        assert!(t.result.is_none());
        assert!(t.output_path.is_none());
    }
}
