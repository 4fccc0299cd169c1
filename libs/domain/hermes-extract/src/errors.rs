// [libs/domain/hermes-extract/src/errors.rs]
//! Error catalog for classification, text extraction, and parsing — the
//! `parse_partial` and `validation` kinds from the error-handling design,
//! plus the LLM-facing kinds re-exported from `hermes-llm-client`.

use hermes_llm_client::LlmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("[parse_partial]: failed to read PDF at {path}: {source}")]
    PdfRead {
        path: String,
        #[source]
        source: pdf_extract::OutputError,
    },

    #[error("[parse_partial]: document contained no extractable text")]
    NoText,

    #[error("[llm_transient]: {0}")]
    LlmTransient(#[source] LlmError),

    #[error("[llm_bad_output]: {0}")]
    LlmBadOutput(String),

    #[error("[validation]: {0}")]
    Validation(String),

    #[error("[storage]: {0}")]
    Storage(#[from] hermes_storage::StorageError),
}

impl From<LlmError> for ExtractError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Network(_) | LlmError::RateLimited { .. } | LlmError::RetriesExhausted(_) => {
                ExtractError::LlmTransient(err)
            }
            LlmError::Decoding(_) | LlmError::MissingField(_) => ExtractError::LlmBadOutput(err.to_string()),
        }
    }
}
