//! Parse logs and the low-confidence review queue — spec section 3,
//! "Logs (append-only)".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row per document parse attempt, written even when the attempt
/// fails — the parser's `finally` path always produces a log row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseLog {
    pub id: Uuid,
    pub document_id: Uuid,
    pub parser_type: ParserType,
    pub tables_extracted: u32,
    pub rules_extracted: u32,
    pub forms_extracted: u32,
    pub factors_extracted: u32,
    pub confidence_avg: rust_decimal::Decimal,
    pub confidence_min: rust_decimal::Decimal,
    pub ai_calls_made: u32,
    pub ai_tokens_used: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_seconds: rust_decimal::Decimal,
    pub status: ParseStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParserType {
    Rate,
    Rule,
    Form,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Completed,
    Partial,
    Failed,
}

/// A single extracted field whose confidence fell below the routing
/// threshold and was queued for human triage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseReviewItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub table_name: String,
    pub field_name: String,
    pub extracted_value: String,
    pub confidence: rust_decimal::Decimal,
    pub context_text: String,
    pub review_priority: ReviewPriority,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    High,
    Medium,
}

impl ReviewPriority {
    /// Fields below 0.50 confidence route `high`, the rest `medium` —
    /// the threshold split spec section 4.5 names.
    pub fn from_confidence(confidence: rust_decimal::Decimal) -> Self {
        use rust_decimal_macros::dec;
        if confidence < dec!(0.50) {
            ReviewPriority::High
        } else {
            ReviewPriority::Medium
        }
    }
}
