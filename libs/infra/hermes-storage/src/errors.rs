// [libs/infra/hermes-storage/src/errors.rs]
//! Error catalog for the storage layer — the `storage` kind from the
//! error-handling design.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("[storage_connection]: {0}")]
    Connection(String),

    #[error("[storage_query]: {0}")]
    Query(#[from] libsql::Error),

    #[error("[storage_mapping]: {0}")]
    Mapping(String),

    #[error("[storage_not_found]: {0}")]
    NotFound(String),

    /// Returned when a natural-key-guarded UPDATE/INSERT affects zero rows
    /// because the expected current row was superseded concurrently.
    #[error("[storage_conflict]: {0}")]
    Conflict(String),

    #[error("[storage_transaction]: {0}")]
    Transaction(String),
}
