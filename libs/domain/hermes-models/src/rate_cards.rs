//! Curated PMI/Title pricing reference data — spec section 3's
//! "PMIRateCard / TitleRateCard" entity. Distinct from `RateTableRecord`
//! (the unexecuted blob extracted from a filing): these rows are
//! hand-loaded and are what the pricing engines in `hermes-pricing`
//! actually read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PremiumType {
    Monthly,
    Single,
    Split,
    LenderPaid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMethod {
    Additive,
    Multiplicative,
    Override,
}

/// One carrier's current grid for one premium type. `state` is `None`
/// for a nationwide card; a state-specific card is preferred at lookup
/// time when both exist for the same carrier/premium type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PmiRateCard {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub state: Option<String>,
    pub premium_type: PremiumType,
    pub source: String,
    pub effective_date: DateTime<Utc>,
    pub is_current: bool,
}

/// A single LTV×FICO×coverage grid cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PmiRateCell {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub ltv_min: Decimal,
    pub ltv_max: Decimal,
    pub fico_min: i32,
    pub fico_max: i32,
    pub coverage_pct: Decimal,
    pub rate_pct: Decimal,
}

/// A conditional rate adjustment. `condition` keys use the `_min` /
/// `_max` / `_eq` / `_in` suffix convention evaluated against the quote
/// request fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PmiAdjustment {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub name: String,
    pub condition: serde_json::Value,
    pub method: AdjustmentMethod,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Owner,
    Lender,
    Simultaneous,
}

/// One carrier's title rate card for one state and policy type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleRateCard {
    pub id: Uuid,
    pub carrier_id: Uuid,
    pub state: String,
    pub policy_type: PolicyType,
    pub source: String,
    pub effective_date: DateTime<Utc>,
    pub is_current: bool,
    pub is_promulgated: bool,
}

/// A coverage-amount band: the premium contribution for the slice of
/// insured amount between `coverage_min` and `coverage_max`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleRateBand {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub coverage_min: Decimal,
    pub coverage_max: Decimal,
    pub rate_per_thousand: Decimal,
    pub flat_fee: Decimal,
    pub minimum_premium: Decimal,
}

/// A loan-amount band governing the simultaneous-issue discount applied
/// to the lender premium.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleSimultaneousIssueBand {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub loan_min: Decimal,
    pub loan_max: Decimal,
    pub discount_rate_per_thousand: Decimal,
    pub discount_pct: Decimal,
    pub flat_fee: Decimal,
}

/// A years-since-prior-policy tier governing the refinance reissue
/// credit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleReissueCreditTier {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub years_since_min: Decimal,
    pub years_since_max: Decimal,
    pub credit_pct: Decimal,
}

/// A single ALTA endorsement's fee schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleEndorsement {
    pub id: Uuid,
    pub rate_card_id: Uuid,
    pub endorsement_code: String,
    pub flat_fee: Decimal,
    pub rate_per_thousand: Decimal,
    pub pct_of_base: Decimal,
}
