// [libs/domain/hermes-tasks/src/errors.rs]
//! Top-level union used only at the task-surface boundary. Every task
//! function returns `Result<TaskSummary, TaskError>`, but internally
//! catches and records per-unit errors into the summary rather than
//! propagating — only a failure that prevents the task from running at
//! all (no DB connection, bad config) reaches this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("[task_storage]: {0}")]
    Storage(#[from] hermes_storage::StorageError),

    #[error("[task_portal]: {0}")]
    Portal(#[from] hermes_portal::errors::PortalError),

    #[error("[task_appetite]: {0}")]
    Appetite(#[from] hermes_appetite::AppetiteError),

    #[error("[task_alerts]: {0}")]
    Alerts(#[from] hermes_alerts::AlertsError),

    #[error("[task_browser]: {0}")]
    Browser(String),

    #[error("[task_unknown]: no task named {0}")]
    UnknownTask(String),
}
