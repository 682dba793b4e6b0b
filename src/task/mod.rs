//! Generation task orchestration
//!
//! Each [`crate::metamodel::GenerationTask`] is owned by one actor running on
//! the tokio runtime. Workers hold a cloneable [`TaskHandle`] and send it
//! commands; the actor applies them in arrival order, so transitions never
//! race. Cancellation is a shared flag that workers check before scheduling
//! more work.

pub mod actor;
pub mod progress;
pub mod state;

pub use actor::{TaskHandle, TaskRegistry};
pub use progress::{DefaultProgressReporter, ProgressReporter};
pub use state::TaskStatusReport;

/// Error message recorded on a task stopped by [`TaskHandle::cancel`]
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// How long a finished task stays queryable before the registry drops it
pub const DEFAULT_TASK_RETENTION_SECS: i64 = 3600;
