//! Carrier, filing, and document entities — spec section 3, "Filing data".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An insurance carrier tracked across both PMI and Title lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carrier {
    pub id: Uuid,
    pub naic_code: String,
    pub name: String,
    pub status: CarrierStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CarrierStatus {
    Active,
    Inactive,
}

/// A single SERFF-tracked rate/rule/form filing for one carrier in one state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateFilingRecord {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub state: String,
    pub line_of_business: LineOfBusiness,
    pub tracking_number: String,
    pub filing_type: String,
    pub status: String,
    pub effective_date: Option<DateTime<Utc>>,
    pub filed_date: Option<DateTime<Utc>>,
    pub disposition_date: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    /// The filing's own stated overall rate change, as a signed percent
    /// (e.g. `-6.2` for a 6.2% decrease). `None` for non-rate filings.
    pub overall_rate_change_pct: Option<rust_decimal::Decimal>,
    pub raw_metadata: serde_json::Value,
    pub is_current: bool,
    pub superseded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineOfBusiness {
    Pmi,
    Title,
}

/// A document attached to a filing (PDF exhibit, rate page, form).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingDocument {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub document_kind: DocumentKind,
    /// SHA-256 of the downloaded bytes, hex-encoded. Unique within a
    /// filing — the same document fetched twice lands on the same row.
    pub checksum_sha256: String,
    pub page_count: Option<u32>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub parse_confidence: Option<rust_decimal::Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    RatePage,
    RuleManual,
    FormSpecimen,
    CoverLetter,
    Other,
}
