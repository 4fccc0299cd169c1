// [libs/domain/hermes-extract/src/parsers/rate_parser.rs]
//! Extracts rate tables — base rates, rating factors, territory tables,
//! and class mappings — from a filing's rate-page documents.

use super::{queue_low_confidence, ConfidenceTracker, DocumentParser, ExtractedContent};
use crate::errors::ExtractError;
use crate::text_extractor::TextExtractor;
use async_trait::async_trait;
use chrono::Utc;
use hermes_llm_client::LlmClient;
use hermes_models::parse::ParserType;
use hermes_storage::repositories::{FilingRepository, ParseLogRepository, RateTableRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

const MAX_PROMPT_CHARS: usize = 6_000;

const TABLE_EXTRACTION_PROMPT_PREFIX: &str = "You are an expert insurance rate analyst. The following filing \
page may contain a rate table. If it does, return a JSON object with keys \
\"classification\" (one of base_rate, rating_factor, territory, class_mapping), \
\"rows\" (array of objects keyed by column header), \"units\" (string or null), \
\"effective_date\" (ISO date string or null), and \"confidence\" (0.0-1.0). \
If the page contains no rate table, return {\"classification\": null}. \
Return ONLY a JSON object, no markdown fences.\n\nPAGE TEXT:\n";

#[derive(Deserialize)]
struct RateTableExtraction {
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    rows: Vec<serde_json::Value>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    effective_date: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.75
}

pub struct RatePayload {
    pub tables: Vec<RateTableExtraction>,
}

pub struct RateParser {
    text_extractor: TextExtractor,
    llm_client: LlmClient,
    filing_repository: FilingRepository,
    rate_table_repository: RateTableRepository,
    parse_log_repository: ParseLogRepository,
    confidence_tracker: ConfidenceTracker,
    ai_calls_made: u32,
}

impl RateParser {
    pub fn new(
        llm_client: LlmClient,
        filing_repository: FilingRepository,
        rate_table_repository: RateTableRepository,
        parse_log_repository: ParseLogRepository,
    ) -> Self {
        Self {
            text_extractor: TextExtractor::new(),
            llm_client,
            filing_repository,
            rate_table_repository,
            parse_log_repository,
            confidence_tracker: ConfidenceTracker::new(),
            ai_calls_made: 0,
        }
    }

    /// A page is a rate-table candidate when it carries a reasonable
    /// density of numeric tokens — a cheap pre-filter so every page of a
    /// long filing isn't sent to the LLM.
    fn looks_like_table(text: &str) -> bool {
        let numeric_tokens = text
            .split_whitespace()
            .filter(|tok| tok.chars().any(|c| c.is_ascii_digit()))
            .count();
        numeric_tokens >= 6
    }
}

#[async_trait]
impl DocumentParser for RateParser {
    type Payload = RatePayload;

    fn parser_type(&self) -> ParserType {
        ParserType::Rate
    }

    fn confidence_tracker(&mut self) -> &mut ConfidenceTracker {
        &mut self.confidence_tracker
    }

    fn parse_log_repository(&self) -> &ParseLogRepository {
        &self.parse_log_repository
    }

    fn ai_calls_made(&self) -> u32 {
        self.ai_calls_made
    }

    async fn extract_content(&mut self, path: &Path) -> Result<ExtractedContent<RatePayload>, ExtractError> {
        let pages = self.text_extractor.extract_pages(path)?;
        if pages.is_empty() {
            return Ok(ExtractedContent {
                payload: RatePayload { tables: Vec::new() },
                tables_extracted: 0,
                rules_extracted: 0,
                forms_extracted: 0,
                factors_extracted: 0,
                warnings: vec!["no pages extracted from PDF".to_string()],
            });
        }

        let mut tables = Vec::new();
        let mut factors_extracted = 0u32;
        let mut warnings = Vec::new();

        for page in &pages {
            if !Self::looks_like_table(&page.text) {
                continue;
            }

            let prompt = format!(
                "{TABLE_EXTRACTION_PROMPT_PREFIX}{}",
                &page.text.chars().take(MAX_PROMPT_CHARS).collect::<String>()
            );

            match self.llm_client.extract(&prompt, 2048).await {
                Ok(raw) => {
                    self.ai_calls_made += 1;
                    match serde_json::from_str::<RateTableExtraction>(&raw) {
                        Ok(extraction) if extraction.classification.is_some() => {
                            let confidence = Decimal::try_from(extraction.confidence).unwrap_or_default();
                            self.confidence_tracker.record(confidence);
                            if extraction.classification.as_deref() == Some("rating_factor") {
                                factors_extracted += extraction.rows.len() as u32;
                            }
                            tables.push(extraction);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(page = page.page_number, error = %e, "unparseable rate table extraction, skipping");
                            warnings.push(format!("page {}: unparseable extraction response", page.page_number));
                        }
                    }
                }
                Err(e) => {
                    warnings.push(format!("page {}: LLM extraction failed: {e}", page.page_number));
                }
            }
        }

        let tables_extracted = tables.len() as u32;
        Ok(ExtractedContent {
            payload: RatePayload { tables },
            tables_extracted,
            rules_extracted: 0,
            forms_extracted: 0,
            factors_extracted,
            warnings,
        })
    }

    async fn store_results(&self, document_id: Uuid, payload: RatePayload) -> Result<(), ExtractError> {
        let filing = self
            .filing_repository
            .filing_for_document(document_id)
            .await?
            .ok_or_else(|| ExtractError::Validation(format!("no filing found for document {document_id}")))?;

        let effective_date = filing.effective_date.unwrap_or_else(Utc::now);
        let rows_json = serde_json::to_value(
            payload
                .tables
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "classification": t.classification,
                        "rows": t.rows,
                        "units": t.units,
                        "effective_date": t.effective_date,
                        "confidence": t.confidence,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ExtractError::Validation(e.to_string()))?;

        self.rate_table_repository
            .record_rate_table(
                filing.carrier_id,
                filing.id,
                &filing.state,
                filing.line_of_business,
                effective_date,
                rows_json,
            )
            .await?;

        for table in &payload.tables {
            if table.confidence < 0.70 {
                queue_low_confidence(
                    self.parse_log_repository.clone(),
                    document_id,
                    "rate_table_records",
                    "classification".to_string(),
                    table.classification.clone().unwrap_or_default(),
                    Decimal::try_from(table.confidence).unwrap_or_default(),
                    format!("{:?}", table.rows.first()),
                );
            }
        }

        Ok(())
    }
}
