use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::metamodel::LogLevel;

/// Receives task updates as the owning actor applies them
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report_progress(&self, task_id: &str, progress: u8, message: &str);
    async fn report_log(&self, task_id: &str, level: LogLevel, message: &str);
    async fn report_error(&self, task_id: &str, error: &str);
    async fn report_completion(&self, task_id: &str, success: bool);
}

/// Default progress reporter that logs to console
pub struct DefaultProgressReporter;

#[async_trait]
impl ProgressReporter for DefaultProgressReporter {
    async fn report_progress(&self, task_id: &str, progress: u8, message: &str) {
        info!("[{}] Progress: {}% - {}", task_id, progress, message);
    }

    async fn report_log(&self, task_id: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!("[{}] {}", task_id, message),
            LogLevel::Warning => warn!("[{}] {}", task_id, message),
            LogLevel::Success => info!("[{}] ✓ {}", task_id, message),
            LogLevel::Error => error!("[{}] ✗ {}", task_id, message),
            LogLevel::Debug => debug!("[{}] {}", task_id, message),
        }
    }

    async fn report_error(&self, task_id: &str, error: &str) {
        error!("[{}] Generation failed: {}", task_id, error);
    }

    async fn report_completion(&self, task_id: &str, success: bool) {
        if success {
            info!("[{}] Generation completed successfully", task_id);
        } else {
            error!("[{}] Generation failed", task_id);
        }
    }
}
