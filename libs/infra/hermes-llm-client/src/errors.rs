// [libs/infra/hermes-llm-client/src/errors.rs]
//! Error catalog for the LLM client — maps onto the `llm_transient` /
//! `llm_bad_output` kinds from the error-handling design.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("[llm_transient]: network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("[llm_transient]: rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("[llm_bad_output]: response could not be decoded: {0}")]
    Decoding(#[from] serde_json::Error),

    #[error("[llm_bad_output]: response missing expected field: {0}")]
    MissingField(String),

    #[error("[llm_transient]: exhausted retry budget after {0} attempts")]
    RetriesExhausted(u32),
}
