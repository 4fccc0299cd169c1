//! HTTP client for the external LLM used by the parser layer.

pub mod client;
pub mod errors;

pub use client::LlmClient;
pub use errors::LlmError;
