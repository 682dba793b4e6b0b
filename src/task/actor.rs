use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

use super::progress::ProgressReporter;
use super::state::TaskStatusReport;
use crate::errors::{TaskError, TaskResult};
use crate::metamodel::{GenerationTask, LogLevel, TaskSummary};

type Reply = oneshot::Sender<TaskResult<()>>;

/// Commands sent to a task actor
enum TaskCommand {
    Start {
        response: Reply,
    },
    Progress {
        progress: i64,
        message: String,
        response: Reply,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    Complete {
        summary: TaskSummary,
        output_path: Option<String>,
        response: Reply,
    },
    Fail {
        message: String,
        response: Reply,
    },
    Restart {
        response: Reply,
    },
    Snapshot {
        response: oneshot::Sender<GenerationTask>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// Owns one generation task; every transition goes through its channel
struct TaskActor {
    task: GenerationTask,
    reporter: Arc<dyn ProgressReporter>,
}

impl TaskActor {
    async fn run(mut self, mut command_rx: mpsc::Receiver<TaskCommand>) {
        debug!("Task actor started for {}", self.task.id);

        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                TaskCommand::Start { response } => {
                    let result = self.task.start();
                    if result.is_ok() {
                        self.task.log(LogLevel::Info, "Generation started");
                        self.reporter
                            .report_progress(&self.task.id, 0, "Generation started")
                            .await;
                    }
                    let _ = response.send(result);
                }
                TaskCommand::Progress {
                    progress,
                    message,
                    response,
                } => {
                    let result = self.task.update_progress(progress);
                    if result.is_ok() {
                        self.reporter
                            .report_progress(&self.task.id, self.task.progress, &message)
                            .await;
                    }
                    let _ = response.send(result);
                }
                TaskCommand::Log { level, message } => {
                    self.reporter.report_log(&self.task.id, level, &message).await;
                    self.task.log(level, message);
                }
                TaskCommand::Complete {
                    summary,
                    output_path,
                    response,
                } => {
                    let result = self.task.complete(summary, output_path);
                    if result.is_ok() {
                        self.task.log(LogLevel::Success, "Generation completed");
                        self.reporter.report_completion(&self.task.id, true).await;
                    }
                    let _ = response.send(result);
                }
                TaskCommand::Fail { message, response } => {
                    let result = self.task.fail(message.clone());
                    if result.is_ok() {
                        self.task.log(LogLevel::Error, message.clone());
                        self.reporter.report_error(&self.task.id, &message).await;
                        self.reporter.report_completion(&self.task.id, false).await;
                    }
                    let _ = response.send(result);
                }
                TaskCommand::Restart { response } => {
                    let result = self.task.restart();
                    if result.is_ok() {
                        self.task.log(LogLevel::Info, "Task restarted");
                    }
                    let _ = response.send(result);
                }
                TaskCommand::Snapshot { response } => {
                    let _ = response.send(self.task.clone());
                }
                TaskCommand::Shutdown { response } => {
                    let _ = response.send(());
                    break;
                }
            }
        }

        debug!("Task actor stopped for {}", self.task.id);
    }
}

/// Cloneable handle workers use to drive a task
#[derive(Clone)]
pub struct TaskHandle {
    id: String,
    command_tx: mpsc::Sender<TaskCommand>,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Spawns the actor owning `task`
    pub fn spawn(task: GenerationTask, reporter: Arc<dyn ProgressReporter>) -> Self {
        let (tx, rx) = mpsc::channel(1000);
        let id = task.id.clone();

        tokio::spawn(async move {
            TaskActor { task, reporter }.run(rx).await;
        });

        debug!("Task actor spawned for {}", id);

        TaskHandle {
            id,
            command_tx: tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn request(&self, build: impl FnOnce(Reply) -> TaskCommand) -> TaskResult<()> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(build(tx))
            .await
            .map_err(|_| TaskError::ActorUnavailable)?;
        rx.await.map_err(|_| TaskError::ActorUnavailable)?
    }

    pub async fn start(&self) -> TaskResult<()> {
        self.request(|response| TaskCommand::Start { response }).await
    }

    pub async fn update_progress(&self, progress: i64, message: impl Into<String>) -> TaskResult<()> {
        let message = message.into();
        self.request(|response| TaskCommand::Progress {
            progress,
            message,
            response,
        })
        .await
    }

    /// Appends a log entry; dropped silently when the actor is gone
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self
            .command_tx
            .send(TaskCommand::Log {
                level,
                message: message.into(),
            })
            .await;
    }

    pub async fn complete(&self, summary: TaskSummary, output_path: Option<String>) -> TaskResult<()> {
        self.request(|response| TaskCommand::Complete {
            summary,
            output_path,
            response,
        })
        .await
    }

    pub async fn fail(&self, message: impl Into<String>) -> TaskResult<()> {
        let message = message.into();
        self.request(|response| TaskCommand::Fail { message, response })
            .await
    }

    pub async fn restart(&self) -> TaskResult<()> {
        self.cancelled.store(false, Ordering::SeqCst);
        self.request(|response| TaskCommand::Restart { response }).await
    }

    /// Copy of the task as the actor currently holds it
    pub async fn snapshot(&self) -> TaskResult<GenerationTask> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(TaskCommand::Snapshot { response: tx })
            .await
            .map_err(|_| TaskError::ActorUnavailable)?;
        rx.await.map_err(|_| TaskError::ActorUnavailable)
    }

    pub async fn status(&self) -> TaskResult<TaskStatusReport> {
        let task = self.snapshot().await?;
        Ok(TaskStatusReport::from(&task))
    }

    /// Asks workers to stop scheduling new units
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .command_tx
            .send(TaskCommand::Shutdown { response: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// Task handles by id
#[derive(Clone)]
pub struct TaskRegistry {
    handles: Arc<RwLock<HashMap<String, TaskHandle>>>,
    reporter: Arc<dyn ProgressReporter>,
}

impl TaskRegistry {
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        TaskRegistry {
            handles: Arc::new(RwLock::new(HashMap::new())),
            reporter,
        }
    }

    /// Spawns an actor for `task` and keeps its handle
    pub async fn register(&self, task: GenerationTask) -> TaskHandle {
        let handle = TaskHandle::spawn(task, Arc::clone(&self.reporter));
        let mut handles = self.handles.write().await;
        if handles.insert(handle.id().to_string(), handle.clone()).is_some() {
            warn!("Replaced existing task handle {}", handle.id());
        }
        handle
    }

    pub async fn get(&self, task_id: &str) -> TaskResult<TaskHandle> {
        self.handles
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    pub async fn status(&self, task_id: &str) -> TaskResult<TaskStatusReport> {
        self.get(task_id).await?.status().await
    }

    pub async fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forgets finished tasks last updated more than `retention` ago, and
    /// any whose actor is gone. Returns how many were dropped.
    pub async fn prune_finished(&self, retention: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - retention;
        let handles: Vec<TaskHandle> = self.handles.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for handle in handles {
            match handle.snapshot().await {
                Ok(task) if task.status.is_terminal() && task.updated_at <= cutoff => {
                    expired.push(task.id)
                }
                Ok(_) => {}
                Err(_) => expired.push(handle.id().to_string()),
            }
        }

        let mut pruned = 0;
        for id in expired {
            if self.remove(&id).await.is_ok() {
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!("Pruned {} finished task(s)", pruned);
        }
        pruned
    }

    /// Stops the actor and forgets the handle
    pub async fn remove(&self, task_id: &str) -> TaskResult<()> {
        let handle = self
            .handles
            .write()
            .await
            .remove(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;
        handle.shutdown().await;
        Ok(())
    }
}
