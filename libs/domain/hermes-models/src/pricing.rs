//! Rate tables and the extracted (but not executed) premium algorithm blob.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A versioned rate table extracted from a filing, keyed to the natural
/// key (carrier, state, line, effective_date) with only one current row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateTableRecord {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub filing_id: Uuid,
    pub state: String,
    pub line_of_business: crate::filing::LineOfBusiness,
    pub effective_date: DateTime<Utc>,
    pub rows: serde_json::Value,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// Extracted premium computation metadata. This is stored for downstream
/// consumers and is never evaluated by the pricing engines in this crate
/// set — the engines price from hand-loaded rate cards, not from this blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PremiumAlgorithm {
    pub id: Uuid,
    pub rate_table_id: Uuid,
    pub formula_kind: FormulaKind,
    pub parameters: serde_json::Value,
    pub is_current: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    LinearByClass,
    TieredByBand,
    FlatPerThousand,
}

/// A monetary amount that has already been rounded to cents, used for
/// premium results returned from the pricing engines.
pub type Money = Decimal;

/// A carrier's standing among its peers for one (state, line, class_code)
/// — recomputed by the appetite profiler alongside the rest of a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierRanking {
    pub id: Uuid,
    pub state: String,
    pub line_of_business: crate::filing::LineOfBusiness,
    pub class_code: String,
    pub carrier_id: Uuid,
    pub rank: i32,
    pub estimated_premium_index: Option<Decimal>,
    pub computed_at: DateTime<Utc>,
}
