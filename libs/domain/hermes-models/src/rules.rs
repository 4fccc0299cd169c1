//! Underwriting rule sets extracted from rule-manual documents — spec
//! section 3's "UnderwritingRule with child EligibilityCriterion",
//! modeled as one JSON blob per filing alongside its rate tables.

use crate::filing::LineOfBusiness;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSetRecord {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub filing_id: Uuid,
    pub state: String,
    pub line_of_business: LineOfBusiness,
    /// Each element carries `rule_type`, `category`, `full_text`, and a
    /// `conditions` map of `{criterion_type, value, operator, unit,
    /// is_hard_rule}`, per spec section 4.5.
    pub rules: serde_json::Value,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}
