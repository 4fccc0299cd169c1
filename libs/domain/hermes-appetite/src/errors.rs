// [libs/domain/hermes-appetite/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppetiteError {
    #[error("[appetite_validation]: {0}")]
    Validation(String),

    #[error("[appetite_storage]: {0}")]
    Storage(#[from] hermes_storage::StorageError),
}
