// [libs/domain/hermes-extract/src/parsers/mod.rs]
//! Common contract shared by the three concrete parsers: a confidence
//! tracker, the low-confidence review router, and the parse-log writer
//! invoked unconditionally, even on failure.

pub mod form_parser;
pub mod rate_parser;
pub mod rule_parser;

use crate::errors::ExtractError;
use async_trait::async_trait;
use chrono::Utc;
use hermes_models::parse::{ParseLog, ParseStatus, ParserType};
use hermes_storage::repositories::ParseLogRepository;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub use form_parser::FormParser;
pub use rate_parser::RateParser;
pub use rule_parser::RuleParser;

/// Summary returned by every parser run — spec section 4.5's common
/// contract.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub tables_extracted: u32,
    pub rules_extracted: u32,
    pub forms_extracted: u32,
    pub factors_extracted: u32,
    pub confidence_avg: Decimal,
    pub confidence_min: Decimal,
    pub ai_calls_made: u32,
    pub ai_tokens_used: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_seconds: Decimal,
    pub status: ParseStatus,
}

/// Accumulates per-field confidence scores and exposes mean/min, mirroring
/// the tracker every concrete parser shares.
#[derive(Debug, Default)]
pub struct ConfidenceTracker {
    scores: Vec<Decimal>,
}

impl ConfidenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, score: Decimal) {
        if score >= Decimal::ZERO && score <= Decimal::ONE {
            self.scores.push(score);
        }
    }

    pub fn average(&self) -> Decimal {
        if self.scores.is_empty() {
            return dec!(0);
        }
        self.scores.iter().sum::<Decimal>() / Decimal::from(self.scores.len())
    }

    pub fn minimum(&self) -> Decimal {
        self.scores.iter().copied().fold(None, |acc, v| match acc {
            None => Some(v),
            Some(a) if v < a => Some(v),
            Some(a) => Some(a),
        }).unwrap_or(dec!(0))
    }

    pub fn reset(&mut self) {
        self.scores.clear();
    }
}

/// Content a concrete parser extracted before storage, plus the standard
/// summary counters the base contract requires in the result.
pub struct ExtractedContent<T> {
    pub payload: T,
    pub tables_extracted: u32,
    pub rules_extracted: u32,
    pub forms_extracted: u32,
    pub factors_extracted: u32,
    pub warnings: Vec<String>,
}

/// Queues a low-confidence extracted field for human review without
/// blocking the caller. Below 0.70 confidence per spec section 4.5; the
/// write runs on a detached task and its failure is only logged.
pub fn queue_low_confidence(
    repo: ParseLogRepository,
    document_id: Uuid,
    table_name: &'static str,
    field_name: String,
    value: String,
    confidence: Decimal,
    context: String,
) {
    if confidence >= dec!(0.70) {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = repo
            .queue_review_item(document_id, table_name, &field_name, &value, confidence, &context)
            .await
        {
            warn!(%document_id, field_name, error = %e, "failed to queue low-confidence field for review");
        }
    });
}

/// Implemented by `RateParser`, `RuleParser`, and `FormParser`. The
/// default `parse` method orchestrates read → extract → store → log,
/// exactly as the shared contract in spec section 4.5 describes; only
/// `extract_content` and `store_results` are parser-specific.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    type Payload: Send;

    fn parser_type(&self) -> ParserType;
    fn confidence_tracker(&mut self) -> &mut ConfidenceTracker;
    fn parse_log_repository(&self) -> &ParseLogRepository;

    /// LLM calls/tokens spent during the most recent `extract_content`
    /// call. Defaults to 0 for parsers that make no LLM calls.
    fn ai_calls_made(&self) -> u32 {
        0
    }
    fn ai_tokens_used(&self) -> u32 {
        0
    }

    async fn extract_content(&mut self, path: &Path) -> Result<ExtractedContent<Self::Payload>, ExtractError>;
    async fn store_results(&self, document_id: Uuid, payload: Self::Payload) -> Result<(), ExtractError>;

    #[instrument(skip(self, path), fields(parser_type = ?self.parser_type()))]
    async fn parse(&mut self, document_id: Uuid, path: &Path) -> ParseResult
    where
        Self: Sized,
    {
        let started = Instant::now();
        self.confidence_tracker().reset();
        let mut result = ParseResult {
            status: ParseStatus::Completed,
            ..Default::default()
        };

        info!(%document_id, path = %path.display(), "starting parse");

        match self.extract_content(path).await {
            Ok(extracted) => {
                result.tables_extracted = extracted.tables_extracted;
                result.rules_extracted = extracted.rules_extracted;
                result.forms_extracted = extracted.forms_extracted;
                result.factors_extracted = extracted.factors_extracted;
                result.warnings = extracted.warnings;

                if let Err(e) = self.store_results(document_id, extracted.payload).await {
                    error!(%document_id, error = %e, "failed to store parse results");
                    result.errors.push(e.to_string());
                    result.status = if result.tables_extracted + result.rules_extracted + result.forms_extracted > 0 {
                        ParseStatus::Partial
                    } else {
                        ParseStatus::Failed
                    };
                }
            }
            Err(e) => {
                error!(%document_id, error = %e, "extraction failed");
                result.errors.push(e.to_string());
                result.status = ParseStatus::Failed;
            }
        }

        result.duration_seconds = Decimal::try_from(started.elapsed().as_secs_f64()).unwrap_or(dec!(0));
        result.confidence_avg = self.confidence_tracker().average();
        result.confidence_min = self.confidence_tracker().minimum();
        result.ai_calls_made = self.ai_calls_made();
        result.ai_tokens_used = self.ai_tokens_used();

        let log = ParseLog {
            id: Uuid::new_v4(),
            document_id,
            parser_type: self.parser_type(),
            tables_extracted: result.tables_extracted,
            rules_extracted: result.rules_extracted,
            forms_extracted: result.forms_extracted,
            factors_extracted: result.factors_extracted,
            confidence_avg: result.confidence_avg,
            confidence_min: result.confidence_min,
            ai_calls_made: result.ai_calls_made,
            ai_tokens_used: result.ai_tokens_used,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            duration_seconds: result.duration_seconds,
            status: result.status,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
        };

        if let Err(e) = self.parse_log_repository().write_log(&log).await {
            warn!(%document_id, error = %e, "failed to write parse log");
        }

        info!(
            %document_id,
            status = ?result.status,
            confidence_avg = %result.confidence_avg,
            duration_seconds = %result.duration_seconds,
            "completed parse"
        );
        result
    }
}
