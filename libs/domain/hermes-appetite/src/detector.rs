// [libs/domain/hermes-appetite/src/detector.rs]
//! Diffs a carrier's freshly recorded filing/rate-table against its
//! predecessor and the stored appetite profile, emitting a typed,
//! strength-scored signal for each meaningful shift: a brand-new market
//! entry, a rate move past threshold, class-code churn, a withdrawal, or
//! a territory expansion.

use crate::extraction::string_set;
use crate::errors::AppetiteError;
use hermes_models::appetite::{AppetiteProfile, ChangeSignal, SignalKind};
use hermes_models::filing::LineOfBusiness;
use hermes_storage::repositories::{AppetiteRepository, FilingRepository, RateTableRepository};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

const RATE_DECREASE_THRESHOLD_PCT: f64 = -5.0;
const RATE_INCREASE_THRESHOLD_PCT: f64 = 10.0;
const WITHDRAWAL_LOOKBACK_DAYS: i64 = 7;

pub struct ChangeDetector {
    filing_repository: FilingRepository,
    rate_table_repository: RateTableRepository,
    appetite_repository: AppetiteRepository,
}

impl ChangeDetector {
    pub fn new(filing_repository: FilingRepository, rate_table_repository: RateTableRepository, appetite_repository: AppetiteRepository) -> Self {
        Self { filing_repository, rate_table_repository, appetite_repository }
    }

    /// Runs every detection rule for one (carrier, state, line) triple and
    /// persists each signal found. Empty if the carrier has no filing
    /// there yet.
    #[instrument(skip(self))]
    pub async fn detect_shifts(&self, carrier_id: Uuid, state: &str, line: LineOfBusiness) -> Result<Vec<ChangeSignal>, AppetiteError> {
        let Some(latest_filing) = self.filing_repository.latest_filing(carrier_id, state, line).await? else {
            return Ok(Vec::new());
        };

        let Some(profile) = self.appetite_repository.profile_for(carrier_id, state, line).await? else {
            let signal = self
                .record(carrier_id, state, line, SignalKind::NewStateEntry, dec!(8), None, latest_filing.id, json!({"tracking_number": latest_filing.tracking_number}))
                .await?;
            return Ok(vec![signal]);
        };

        let mut signals = Vec::new();

        let since = chrono::Utc::now() - chrono::Duration::days(WITHDRAWAL_LOOKBACK_DAYS);
        let withdrawn_count = self.filing_repository.withdrawn_filing_count_recent(carrier_id, state, line, since).await?;
        if withdrawn_count > 0 {
            signals.push(
                self.record(
                    carrier_id,
                    state,
                    line,
                    SignalKind::FilingWithdrawal,
                    clamp_strength(withdrawn_count as f64 + 3.0, 5.0),
                    None,
                    latest_filing.id,
                    json!({"withdrawn_count": withdrawn_count, "window_days": WITHDRAWAL_LOOKBACK_DAYS}),
                )
                .await?,
            );
        }

        if let Some(signal) = self.detect_rate_change(carrier_id, state, line, &latest_filing).await? {
            signals.push(signal);
        }

        let current = self.rate_table_repository.recent_for_key(carrier_id, state, line, 1).await?;
        if let Some(current) = current.first() {
            signals.extend(self.detect_class_code_changes(carrier_id, state, line, current, &profile, latest_filing.id).await?);
            if let Some(signal) = self.detect_territory_expansion(carrier_id, state, line, current, &profile, latest_filing.id).await? {
                signals.push(signal);
            }
        }

        Ok(signals)
    }

    async fn detect_rate_change(
        &self,
        carrier_id: Uuid,
        state: &str,
        line: LineOfBusiness,
        latest_filing: &hermes_models::filing::RateFilingRecord,
    ) -> Result<Option<ChangeSignal>, AppetiteError> {
        let Some(pct_change) = latest_filing.overall_rate_change_pct.and_then(|d| d.to_f64()) else {
            return Ok(None);
        };

        let (kind, raw_strength) = if pct_change <= RATE_DECREASE_THRESHOLD_PCT {
            (SignalKind::RateDecrease, pct_change.abs() / 2.0)
        } else if pct_change >= RATE_INCREASE_THRESHOLD_PCT {
            (SignalKind::RateIncrease, pct_change / 3.0)
        } else {
            return Ok(None);
        };

        let signal = self
            .record(
                carrier_id,
                state,
                line,
                kind,
                clamp_strength(raw_strength, 1.0),
                None,
                latest_filing.id,
                json!({"pct_change": pct_change}),
            )
            .await?;
        Ok(Some(signal))
    }

    async fn detect_class_code_changes(
        &self,
        carrier_id: Uuid,
        state: &str,
        line: LineOfBusiness,
        current: &hermes_models::pricing::RateTableRecord,
        profile: &AppetiteProfile,
        current_filing_id: Uuid,
    ) -> Result<Vec<ChangeSignal>, AppetiteError> {
        let current_classes = string_set(&current.rows, &["class_code", "carrier_class_code"]);
        let prior_classes: std::collections::BTreeSet<String> = profile.eligible_classes.iter().cloned().collect();

        let added: Vec<&String> = current_classes.difference(&prior_classes).collect();
        let removed: Vec<&String> = prior_classes.difference(&current_classes).collect();

        let mut signals = Vec::new();
        if !added.is_empty() {
            signals.push(
                self.record(
                    carrier_id,
                    state,
                    line,
                    SignalKind::ExpandedClasses,
                    clamp_strength(added.len() as f64, 1.0),
                    None,
                    current_filing_id,
                    json!({"added": added}),
                )
                .await?,
            );
        }
        if !removed.is_empty() {
            signals.push(
                self.record(
                    carrier_id,
                    state,
                    line,
                    SignalKind::ContractedClasses,
                    clamp_strength(removed.len() as f64 + 2.0, 1.0),
                    None,
                    current_filing_id,
                    json!({"removed": removed}),
                )
                .await?,
            );
        }
        Ok(signals)
    }

    async fn detect_territory_expansion(
        &self,
        carrier_id: Uuid,
        state: &str,
        line: LineOfBusiness,
        current: &hermes_models::pricing::RateTableRecord,
        profile: &AppetiteProfile,
        current_filing_id: Uuid,
    ) -> Result<Option<ChangeSignal>, AppetiteError> {
        let current_territories = string_set(&current.rows, &["territory", "territory_code"]);
        let prior_territories: std::collections::BTreeSet<String> =
            profile.territory_preference.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default();
        let new_territories: Vec<&String> = current_territories.difference(&prior_territories).collect();
        if new_territories.is_empty() {
            return Ok(None);
        }

        let signal = self
            .record(
                carrier_id,
                state,
                line,
                SignalKind::TerritoryExpansion,
                clamp_strength(new_territories.len() as f64 + 2.0, 3.0),
                None,
                current_filing_id,
                json!({"new_territories": new_territories}),
            )
            .await?;
        Ok(Some(signal))
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        carrier_id: Uuid,
        state: &str,
        line: LineOfBusiness,
        kind: SignalKind,
        strength: Decimal,
        previous_filing_id: Option<Uuid>,
        current_filing_id: Uuid,
        detail: serde_json::Value,
    ) -> Result<ChangeSignal, AppetiteError> {
        Ok(self
            .appetite_repository
            .record_signal(carrier_id, state, line, kind, strength, previous_filing_id, current_filing_id, detail)
            .await?)
    }
}

/// Floors a raw signal strength at `min_raw` and caps it at 10 — every
/// signal kind scores on the same 1-10 scale.
fn clamp_strength(raw: f64, min_raw: f64) -> Decimal {
    let bounded = raw.max(min_raw).min(10.0);
    Decimal::from_f64_retain(bounded).unwrap_or(dec!(10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_strength_floors_and_caps() {
        assert_eq!(clamp_strength(0.1, 1.0), dec!(1));
        assert_eq!(clamp_strength(50.0, 1.0), dec!(10));
        assert_eq!(clamp_strength(4.0, 1.0), dec!(4));
    }

    #[test]
    fn rate_decrease_strength_matches_known_values() {
        assert_eq!(clamp_strength((-10.0_f64).abs() / 2.0, 1.0), dec!(5));
        assert_eq!(clamp_strength((-24.0_f64).abs() / 2.0, 1.0), dec!(10));
    }
}
