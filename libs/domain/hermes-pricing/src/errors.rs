// [libs/domain/hermes-pricing/src/errors.rs]
//! Error catalog for the pricing engines — the `validation` kind from
//! the error-handling design, plus the storage errors the engines read
//! rate cards through.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("[pricing_validation]: {0}")]
    Validation(String),

    #[error("[pricing_storage]: {0}")]
    Storage(#[from] hermes_storage::StorageError),
}
