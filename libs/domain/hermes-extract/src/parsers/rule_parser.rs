// [libs/domain/hermes-extract/src/parsers/rule_parser.rs]
//! Extracts underwriting rules and eligibility criteria from rule-manual
//! documents.

use super::{queue_low_confidence, ConfidenceTracker, DocumentParser, ExtractedContent};
use crate::errors::ExtractError;
use crate::text_extractor::TextExtractor;
use async_trait::async_trait;
use hermes_llm_client::LlmClient;
use hermes_models::parse::ParserType;
use hermes_storage::repositories::{FilingRepository, ParseLogRepository, RuleSetRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

const MAX_PROMPT_CHARS: usize = 10_000;

const RULE_EXTRACTION_PROMPT_PREFIX: &str = "You are an expert underwriting analyst. Extract every underwriting \
rule and eligibility criterion from the following rule-manual text. Return a JSON array where each \
element has: \"rule_type\" (e.g. eligibility, exclusion, referral), \"category\" (short label), \
\"full_text\" (verbatim rule text, truncated at 1000 chars), \"conditions\" (array of \
{\"criterion_type\", \"value\", \"operator\" one of eq|gt|ge|lt|le|in, \"unit\" or null, \"is_hard_rule\" \
boolean}), and \"confidence\" (0.0-1.0). Return ONLY a valid JSON array, no markdown fences.\n\nMANUAL TEXT:\n";

#[derive(Deserialize, Clone)]
struct RuleExtraction {
    #[serde(default = "default_rule_type")]
    rule_type: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    full_text: String,
    #[serde(default)]
    conditions: Vec<serde_json::Value>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.75
}

fn default_rule_type() -> String {
    "eligibility".to_string()
}

pub struct RulePayload {
    pub rules: Vec<RuleExtraction>,
}

pub struct RuleParser {
    text_extractor: TextExtractor,
    llm_client: LlmClient,
    filing_repository: FilingRepository,
    rule_set_repository: RuleSetRepository,
    parse_log_repository: ParseLogRepository,
    confidence_tracker: ConfidenceTracker,
    ai_calls_made: u32,
}

impl RuleParser {
    pub fn new(
        llm_client: LlmClient,
        filing_repository: FilingRepository,
        rule_set_repository: RuleSetRepository,
        parse_log_repository: ParseLogRepository,
    ) -> Self {
        Self {
            text_extractor: TextExtractor::new(),
            llm_client,
            filing_repository,
            rule_set_repository,
            parse_log_repository,
            confidence_tracker: ConfidenceTracker::new(),
            ai_calls_made: 0,
        }
    }
}

#[async_trait]
impl DocumentParser for RuleParser {
    type Payload = RulePayload;

    fn parser_type(&self) -> ParserType {
        ParserType::Rule
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

    async fn extract_content(&mut self, path: &Path) -> Result<ExtractedContent<RulePayload>, ExtractError> {
        let pages = self.text_extractor.extract_pages(path)?;
        if pages.is_empty() {
            return Ok(ExtractedContent {
                payload: RulePayload { rules: Vec::new() },
                tables_extracted: 0,
                rules_extracted: 0,
                forms_extracted: 0,
                factors_extracted: 0,
                warnings: vec!["no pages extracted from PDF".to_string()],
            });
        }

        let full_text: String = pages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let truncated: String = full_text.chars().take(MAX_PROMPT_CHARS).collect();
        let prompt = format!("{RULE_EXTRACTION_PROMPT_PREFIX}{truncated}");

        let mut warnings = Vec::new();
        let rules = match self.llm_client.extract(&prompt, 4096).await {
            Ok(raw) => {
                self.ai_calls_made += 1;
                match serde_json::from_str::<Vec<RuleExtraction>>(&raw) {
                    Ok(parsed) => {
                        for rule in &parsed {
                            self.confidence_tracker
                                .record(Decimal::try_from(rule.confidence).unwrap_or_default());
                        }
                        parsed
                    }
                    Err(e) => {
                        warn!(error = %e, "unparseable rule extraction response, skipping");
                        warnings.push("unparseable rule extraction response".to_string());
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                warnings.push(format!("LLM extraction failed: {e}"));
                Vec::new()
            }
        };

        let rules_extracted = rules.len() as u32;
        Ok(ExtractedContent {
            payload: RulePayload { rules },
            tables_extracted: 0,
            rules_extracted,
            forms_extracted: 0,
            factors_extracted: 0,
            warnings,
        })
    }

    async fn store_results(&self, document_id: Uuid, payload: RulePayload) -> Result<(), ExtractError> {
        let filing = self
            .filing_repository
            .filing_for_document(document_id)
            .await?
            .ok_or_else(|| ExtractError::Validation(format!("no filing found for document {document_id}")))?;

        let rules_json = serde_json::to_value(
            payload
                .rules
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "rule_type": r.rule_type,
                        "category": r.category,
                        "full_text": r.full_text,
                        "conditions": r.conditions,
                        "confidence": r.confidence,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ExtractError::Validation(e.to_string()))?;

        self.rule_set_repository
            .record_rule_set(filing.carrier_id, filing.id, &filing.state, filing.line_of_business, rules_json)
            .await?;

        for rule in &payload.rules {
            if rule.confidence < 0.70 {
                queue_low_confidence(
                    self.parse_log_repository.clone(),
                    document_id,
                    "rule_set_records",
                    "rule_type".to_string(),
                    rule.rule_type.clone(),
                    Decimal::try_from(rule.confidence).unwrap_or_default(),
                    rule.full_text.clone(),
                );
            }
        }

        Ok(())
    }
}
