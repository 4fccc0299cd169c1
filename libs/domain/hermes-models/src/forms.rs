//! Policy forms and their provisions — spec section 3's "PolicyForm with
//! child FormProvision".

use crate::filing::LineOfBusiness;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyFormRecord {
    pub id: Uuid,
    pub filing_id: Uuid,
    pub carrier_id: Uuid,
    pub state: String,
    pub line_of_business: LineOfBusiness,
    pub form_number: String,
    pub form_name: Option<String>,
    pub form_edition_date: Option<String>,
    pub form_type: FormType,
    pub is_manuscript: bool,
    pub source_document_id: Uuid,
    pub confidence: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Policy,
    Endorsement,
    Application,
    Schedule,
    Certificate,
    Notice,
    Declarations,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormProvision {
    pub id: Uuid,
    pub form_id: Uuid,
    pub provision_type: ProvisionType,
    pub provision_key: Option<String>,
    pub provision_text_summary: String,
    pub provision_text_full: Option<String>,
    pub section_reference: Option<String>,
    pub is_coverage_broadening: Option<bool>,
    pub is_coverage_restricting: Option<bool>,
    pub iso_comparison_notes: Option<String>,
    pub confidence: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionType {
    CoverageGrant,
    Exclusion,
    Condition,
    Definition,
}
