//! libsql-backed persistence for the Hermes pipeline.

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StorageClient;
pub use errors::StorageError;
