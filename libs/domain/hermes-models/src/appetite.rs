//! Appetite profiles and change-detector signals — spec section 4.7.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A carrier's current underwriting appetite for a state/line, recomputed
/// periodically from the most recent current filings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppetiteProfile {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub state: String,
    pub line_of_business: crate::filing::LineOfBusiness,
    /// 0–10 overall appetite, blending filing frequency, recency, rate
    /// moves, and eligibility breadth.
    pub appetite_score: Decimal,
    pub eligible_classes: Vec<String>,
    pub ineligible_classes: Vec<String>,
    pub preferred_classes: Vec<String>,
    /// Territory code → preference indicator, diffed by the change
    /// detector to find newly opened territories.
    pub territory_preference: serde_json::Value,
    pub min_fico: Option<i32>,
    pub max_ltv: Option<Decimal>,
    pub limit_min: Option<Decimal>,
    pub limit_max: Option<Decimal>,
    pub deductible_min: Option<Decimal>,
    pub deductible_max: Option<Decimal>,
    pub premium_min: Option<Decimal>,
    pub premium_max: Option<Decimal>,
    pub rate_competitiveness_index: Decimal,
    pub last_rate_change_pct: Option<Decimal>,
    pub source_filing_count: i32,
    pub covered_property_types: Vec<String>,
    /// Flipped to `false` by the `stale_data_check` task once a profile
    /// hasn't been recomputed in 90 days — it stays in the table for
    /// historical trending but is no longer treated as the carrier's
    /// live appetite.
    pub is_current: bool,
    pub computed_at: DateTime<Utc>,
}

/// A detected change between two consecutive current filings for the same
/// natural key, with a clamped [1, 10] strength score. `previous_filing_id`
/// is absent only for `new_state_entry`, where there is no predecessor to
/// diff against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeSignal {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub state: String,
    pub line_of_business: crate::filing::LineOfBusiness,
    pub kind: SignalKind,
    pub strength: Decimal,
    pub previous_filing_id: Option<Uuid>,
    pub current_filing_id: Uuid,
    pub detail: serde_json::Value,
    pub acknowledged: bool,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RateDecrease,
    RateIncrease,
    ExpandedClasses,
    ContractedClasses,
    NewStateEntry,
    FilingWithdrawal,
    TerritoryExpansion,
}
