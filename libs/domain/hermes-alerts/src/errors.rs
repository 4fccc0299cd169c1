// [libs/domain/hermes-alerts/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertsError {
    #[error("[alerts_not_found]: {0}")]
    NotFound(String),

    #[error("[alerts_storage]: {0}")]
    Storage(#[from] hermes_storage::StorageError),
}
