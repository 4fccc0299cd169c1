// [libs/infra/hermes-llm-client/src/client.rs]
//! A thin, vendor-neutral client for the external LLM used by the parser
//! layer to extract structured data from unstructured filing text. No
//! provider is named anywhere in this module or its configuration.

use crate::errors::LlmError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

const MIN_BACKOFF: Duration = Duration::from_secs(4);
const MAX_BACKOFF: Duration = Duration::from_secs(120);
const MAX_ATTEMPTS: u32 = 6;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    completion: String,
}

pub struct LlmClient {
    http: Client,
    base_url: String,
    model_name: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: String, model_name: String) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .expect("api key contains invalid header characters");
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        Self {
            http: Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(90))
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name,
        }
    }

    /// Sends a single extraction prompt, retrying transient failures with
    /// exponential backoff (4s floor, 120s ceiling, at most 6 attempts).
    /// Only rate-limit (429), connection, and 5xx failures are retried;
    /// all other non-2xx statuses are reported as a permanent bad-output
    /// error without retrying.
    #[instrument(skip(self, prompt))]
    pub async fn extract(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let mut backoff = MIN_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_extract(prompt, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(RetryableError::Retry(reason)) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %reason, "retrying LLM extraction after transient failure");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(RetryableError::Retry(_)) => return Err(LlmError::RetriesExhausted(MAX_ATTEMPTS)),
                Err(RetryableError::Permanent(e)) => return Err(e),
            }
        }

        Err(LlmError::RetriesExhausted(MAX_ATTEMPTS))
    }

    async fn try_extract(&self, prompt: &str, max_tokens: u32) -> Result<String, RetryableError> {
        let url = format!("{}/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CompletionRequest {
                model: &self.model_name,
                prompt,
                max_tokens,
            })
            .send()
            .await
            .map_err(|e| RetryableError::Retry(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| RetryableError::Permanent(LlmError::Decoding(e)))?;
                Ok(body.completion)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(RetryableError::Retry("rate limited".into())),
            status if status.is_server_error() => {
                Err(RetryableError::Retry(format!("server error {status}")))
            }
            status => Err(RetryableError::Permanent(LlmError::MissingField(format!(
                "unexpected status {status}"
            )))),
        }
    }
}

enum RetryableError {
    Retry(String),
    Permanent(LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = MIN_BACKOFF;
        for _ in 0..10 {
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }
}
