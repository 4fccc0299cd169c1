// [libs/domain/hermes-extract/src/parsers/form_parser.rs]
//! Extracts policy form metadata and provisions. First-page regex finds
//! form number, edition date, and form type; the LLM summarises and
//! classifies the substantive provisions in the body.

use super::{queue_low_confidence, ConfidenceTracker, DocumentParser, ExtractedContent};
use crate::errors::ExtractError;
use crate::text_extractor::TextExtractor;
use async_trait::async_trait;
use hermes_llm_client::LlmClient;
use hermes_models::filing::DocumentKind;
use hermes_models::forms::{FormType, ProvisionType};
use hermes_models::parse::ParserType;
use hermes_storage::repositories::{FilingRepository, FormRepository, ParseLogRepository};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

const MAX_FORM_CHARS: usize = 12_000;

const PROVISION_EXTRACTION_PROMPT_PREFIX: &str = "You are an expert commercial insurance analyst. Analyse the \
following policy form text and extract all key provisions. Return a JSON array where each element has: \
\"provision_type\" (coverage_grant, exclusion, condition, or definition), \"provision_key\" (short \
identifier), \"provision_text_summary\" (1-3 sentence summary), \"provision_text_full\" (verbatim clause, \
truncated at 1000 chars), \"section_reference\" (section label or null), \"is_coverage_broadening\" \
(true/false/null), \"is_coverage_restricting\" (true/false/null), \"iso_comparison_notes\" (string or null), \
and \"confidence\" (0.0-1.0). Return ONLY a valid JSON array, no markdown fences.\n\nFORM TEXT:\n";

fn form_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:form\s+(?:no\.?|number)?|form:)\s*([A-Z0-9][-A-Z0-9 ]{1,30})").unwrap())
}

fn edition_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:ed(?:ition)?\.?\s*|rev(?:ised)?\.?\s*|dated?\s*)(\d{1,2}[/-]\d{2,4}|\d{4})").unwrap()
    })
}

const FORM_TYPE_KEYWORDS: &[(FormType, &[&str])] = &[
    (FormType::Endorsement, &["endorsement", "amendatory", "amendment"]),
    (FormType::Application, &["application", "acord"]),
    (FormType::Schedule, &["schedule", "supplemental dec"]),
    (FormType::Certificate, &["certificate"]),
    (FormType::Notice, &["notice", "advisory"]),
    (FormType::Declarations, &["declarations", "dec page"]),
];

#[derive(Deserialize, Clone)]
struct ProvisionExtraction {
    #[serde(default = "default_provision_type")]
    provision_type: String,
    #[serde(default)]
    provision_key: Option<String>,
    #[serde(default)]
    provision_text_summary: String,
    #[serde(default)]
    provision_text_full: Option<String>,
    #[serde(default)]
    section_reference: Option<String>,
    #[serde(default)]
    is_coverage_broadening: Option<bool>,
    #[serde(default)]
    is_coverage_restricting: Option<bool>,
    #[serde(default)]
    iso_comparison_notes: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.75
}

fn default_provision_type() -> String {
    "condition".to_string()
}

struct FormMetadata {
    form_number: Option<String>,
    form_edition_date: Option<String>,
    form_name: Option<String>,
    form_type: FormType,
    is_manuscript: bool,
}

pub struct FormPayload {
    metadata: FormMetadata,
    provisions: Vec<ProvisionExtraction>,
}

pub struct FormParser {
    text_extractor: TextExtractor,
    llm_client: LlmClient,
    filing_repository: FilingRepository,
    form_repository: FormRepository,
    parse_log_repository: ParseLogRepository,
    confidence_tracker: ConfidenceTracker,
    ai_calls_made: u32,
}

impl FormParser {
    pub fn new(
        llm_client: LlmClient,
        filing_repository: FilingRepository,
        form_repository: FormRepository,
        parse_log_repository: ParseLogRepository,
    ) -> Self {
        Self {
            text_extractor: TextExtractor::new(),
            llm_client,
            filing_repository,
            form_repository,
            parse_log_repository,
            confidence_tracker: ConfidenceTracker::new(),
            ai_calls_made: 0,
        }
    }

    fn extract_first_page_metadata(first_page_text: &str) -> FormMetadata {
        let form_number = form_number_re()
            .captures(first_page_text)
            .map(|c| c[1].trim().to_string());

        let form_edition_date = edition_date_re()
            .captures(first_page_text)
            .map(|c| c[1].trim().to_string());

        let form_name = first_page_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(10)
            .find(|l| l.len() > 10 && !l.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
            .map(|l| l.chars().take(500).collect());

        let form_type = detect_form_type(first_page_text, form_name.as_deref());

        let is_manuscript = form_number
            .as_deref()
            .map(|n| !Regex::new(r"^[A-Z]{2,4}\s*\d{4,6}").unwrap().is_match(n))
            .unwrap_or(true);

        FormMetadata {
            form_number,
            form_edition_date,
            form_name,
            form_type,
            is_manuscript,
        }
    }
}

fn detect_form_type(first_page_text: &str, form_name: Option<&str>) -> FormType {
    let combined = format!("{} {}", first_page_text, form_name.unwrap_or("")).to_lowercase();
    for (form_type, keywords) in FORM_TYPE_KEYWORDS {
        if keywords.iter().any(|kw| combined.contains(kw)) {
            return *form_type;
        }
    }
    FormType::Policy
}

#[async_trait]
impl DocumentParser for FormParser {
    type Payload = FormPayload;

    fn parser_type(&self) -> ParserType {
        ParserType::Form
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

    async fn extract_content(&mut self, path: &Path) -> Result<ExtractedContent<FormPayload>, ExtractError> {
        let pages = self.text_extractor.extract_pages(path)?;
        if pages.is_empty() {
            return Ok(ExtractedContent {
                payload: FormPayload {
                    metadata: FormMetadata {
                        form_number: None,
                        form_edition_date: None,
                        form_name: None,
                        form_type: FormType::Policy,
                        is_manuscript: true,
                    },
                    provisions: Vec::new(),
                },
                tables_extracted: 0,
                rules_extracted: 0,
                forms_extracted: 0,
                factors_extracted: 0,
                warnings: vec!["no pages extracted from PDF".to_string()],
            });
        }

        let metadata = Self::extract_first_page_metadata(&pages[0].text);

        let full_text: String = pages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let truncated: String = full_text.chars().take(MAX_FORM_CHARS).collect();
        let prompt = format!("{PROVISION_EXTRACTION_PROMPT_PREFIX}{truncated}");

        let mut warnings = Vec::new();
        let provisions = match self.llm_client.extract(&prompt, 4096).await {
            Ok(raw) => {
                self.ai_calls_made += 1;
                match serde_json::from_str::<Vec<ProvisionExtraction>>(&raw) {
                    Ok(parsed) => {
                        for provision in &parsed {
                            self.confidence_tracker
                                .record(Decimal::try_from(provision.confidence).unwrap_or_default());
                        }
                        parsed
                    }
                    Err(e) => {
                        warn!(error = %e, "unparseable provision extraction response");
                        warnings.push("provision extraction failed".to_string());
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                warnings.push(format!("provision extraction failed: {e}"));
                Vec::new()
            }
        };

        Ok(ExtractedContent {
            payload: FormPayload { metadata, provisions },
            tables_extracted: 0,
            rules_extracted: 0,
            forms_extracted: 1,
            factors_extracted: 0,
            warnings,
        })
    }

    async fn store_results(&self, document_id: Uuid, payload: FormPayload) -> Result<(), ExtractError> {
        let filing = self
            .filing_repository
            .filing_for_document(document_id)
            .await?
            .ok_or_else(|| ExtractError::Validation(format!("no filing found for document {document_id}")))?;

        let form_confidence = if payload.metadata.form_number.is_some() {
            rust_decimal::Decimal::new(85, 2)
        } else {
            rust_decimal::Decimal::new(40, 2)
        };

        let form = self
            .form_repository
            .upsert_form(
                filing.id,
                filing.carrier_id,
                &filing.state,
                filing.line_of_business,
                payload.metadata.form_number.as_deref().unwrap_or("UNKNOWN"),
                payload.metadata.form_name.as_deref(),
                payload.metadata.form_edition_date.as_deref(),
                payload.metadata.form_type,
                payload.metadata.is_manuscript,
                document_id,
                form_confidence,
            )
            .await?;

        for provision in &payload.provisions {
            let provision_type = match provision.provision_type.as_str() {
                "coverage_grant" => ProvisionType::CoverageGrant,
                "exclusion" => ProvisionType::Exclusion,
                "definition" => ProvisionType::Definition,
                _ => ProvisionType::Condition,
            };
            let confidence = Decimal::try_from(provision.confidence).unwrap_or_default();

            self.form_repository
                .insert_provision(
                    form.id,
                    provision_type,
                    provision.provision_key.as_deref(),
                    &provision.provision_text_summary,
                    provision.provision_text_full.as_deref(),
                    provision.section_reference.as_deref(),
                    provision.is_coverage_broadening,
                    provision.is_coverage_restricting,
                    provision.iso_comparison_notes.as_deref(),
                    confidence,
                )
                .await?;

            if confidence < Decimal::new(70, 2) {
                queue_low_confidence(
                    self.parse_log_repository.clone(),
                    document_id,
                    "form_provisions",
                    "provision_type".to_string(),
                    provision.provision_type.clone(),
                    confidence,
                    provision.provision_text_summary.clone(),
                );
            }
        }

        Ok(())
    }
}

/// Convenience for the task surface: classifies the document once more
/// against the `DocumentKind` enum, used to route a claimed document to
/// the right concrete parser.
pub fn expected_for(kind: DocumentKind) -> bool {
    matches!(kind, DocumentKind::FormSpecimen)
}
