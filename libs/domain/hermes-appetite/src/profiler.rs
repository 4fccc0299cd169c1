// [libs/domain/hermes-appetite/src/profiler.rs]
//! Recomputes a carrier's appetite profile from its own current rate
//! table against the rest of the market filed in the same state/line.

use crate::extraction::{average_rate, average_rate_for_class, classes_with_status, max_decimal, min_decimal, min_i32, string_set};
use crate::errors::AppetiteError;
use hermes_models::appetite::AppetiteProfile;
use hermes_models::filing::LineOfBusiness;
use hermes_storage::repositories::{AppetiteRepository, FilingRepository, RateTableRepository};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use tracing::instrument;
use uuid::Uuid;

/// Ranking refresh caps at 50 class codes per recompute to bound the
/// number of upserts a single run issues.
const RANKING_CLASS_CODE_CAP: usize = 50;

pub struct AppetiteProfiler {
    rate_table_repository: RateTableRepository,
    filing_repository: FilingRepository,
    appetite_repository: AppetiteRepository,
}

impl AppetiteProfiler {
    pub fn new(rate_table_repository: RateTableRepository, filing_repository: FilingRepository, appetite_repository: AppetiteRepository) -> Self {
        Self { rate_table_repository, filing_repository, appetite_repository }
    }

    /// Recomputes and upserts the profile for one carrier/state/line.
    /// `min_fico`/`max_ltv`/`covered_property_types` and the eligible,
    /// ineligible, and preferred class sets all come straight out of the
    /// carrier's own current rate table rows; the competitiveness index
    /// compares its average rate against every current carrier's rows
    /// filed for the same state/line.
    #[instrument(skip(self))]
    pub async fn recompute(&self, carrier_id: Uuid, state: &str, line: LineOfBusiness) -> Result<AppetiteProfile, AppetiteError> {
        let market = self.rate_table_repository.current_for_state(state, line).await?;

        let own_row = market.iter().find(|r| r.carrier_id == carrier_id).ok_or_else(|| {
            AppetiteError::Validation(format!("no current rate table for carrier {carrier_id} in {state}"))
        })?;

        let min_fico = min_i32(&own_row.rows, &["min_fico", "fico_min", "min_fico_score"]);
        let max_ltv = max_decimal(&own_row.rows, &["ltv", "max_ltv", "ltv_max"]);
        let covered_property_types: Vec<String> = string_set(&own_row.rows, &["property_type", "occupancy_type"]).into_iter().collect();

        let eligible_classes: Vec<String> = classes_with_status(&own_row.rows, "eligible").into_iter().collect();
        let ineligible_classes: Vec<String> = classes_with_status(&own_row.rows, "ineligible").into_iter().collect();
        let preferred_classes: Vec<String> = classes_with_status(&own_row.rows, "preferred").into_iter().collect();

        let territories = string_set(&own_row.rows, &["territory", "territory_code"]);
        let territory_preference = serde_json::Value::Object(territories.into_iter().map(|t| (t, serde_json::Value::Bool(true))).collect());

        let limit_min = min_decimal(&own_row.rows, &["limit", "coverage_limit"]);
        let limit_max = max_decimal(&own_row.rows, &["limit", "coverage_limit"]);
        let deductible_min = min_decimal(&own_row.rows, &["deductible"]);
        let deductible_max = max_decimal(&own_row.rows, &["deductible"]);
        let premium_min = min_decimal(&own_row.rows, &["premium", "annual_premium"]);
        let premium_max = max_decimal(&own_row.rows, &["premium", "annual_premium"]);

        let latest_filing = self.filing_repository.latest_filing(carrier_id, state, line).await?;
        let last_rate_change_pct = latest_filing.as_ref().and_then(|f| f.overall_rate_change_pct);
        let source_filing_count = self.filing_repository.filing_count_for_key(carrier_id, state, line).await? as i32;

        let index = self.competitiveness_index(carrier_id, &market);
        let appetite_score = appetite_score(
            source_filing_count,
            latest_filing.as_ref().and_then(|f| f.filed_date),
            last_rate_change_pct,
            eligible_classes.len(),
            ineligible_classes.len(),
        );

        let profile = self
            .appetite_repository
            .upsert_profile(
                carrier_id,
                state,
                line,
                appetite_score,
                &eligible_classes,
                &ineligible_classes,
                &preferred_classes,
                territory_preference,
                min_fico,
                max_ltv,
                limit_min,
                limit_max,
                deductible_min,
                deductible_max,
                premium_min,
                premium_max,
                index,
                last_rate_change_pct,
                source_filing_count,
                &covered_property_types,
            )
            .await?;

        self.refresh_rankings(carrier_id, state, line, &eligible_classes, &own_row.rows).await?;

        Ok(profile)
    }

    /// Refreshes `carrier_rankings` for up to [`RANKING_CLASS_CODE_CAP`]
    /// of the carrier's own eligible class codes, ranking it against
    /// every other carrier already ranked for that (state, line, class).
    async fn refresh_rankings(
        &self,
        carrier_id: Uuid,
        state: &str,
        line: LineOfBusiness,
        class_codes: &[String],
        own_rows: &serde_json::Value,
    ) -> Result<(), AppetiteError> {
        for class_code in class_codes.iter().take(RANKING_CLASS_CODE_CAP) {
            let premium_index = average_rate_for_class(own_rows, class_code).and_then(Decimal::from_f64_retain);
            self.appetite_repository.upsert_ranking(state, line, class_code, carrier_id, premium_index).await?;
        }
        Ok(())
    }

    fn competitiveness_index(&self, carrier_id: Uuid, market: &[hermes_models::pricing::RateTableRecord]) -> Decimal {
        let own_avg = market.iter().filter(|r| r.carrier_id == carrier_id).find_map(|r| average_rate(&r.rows));
        let market_avg = {
            let rates: Vec<f64> = market.iter().filter_map(|r| average_rate(&r.rows)).collect();
            if rates.is_empty() {
                None
            } else {
                Some(rates.iter().sum::<f64>() / rates.len() as f64)
            }
        };

        let (Some(own_avg), Some(market_avg)) = (own_avg, market_avg) else {
            return dec!(50);
        };
        if market_avg == 0.0 {
            return dec!(50);
        }

        let ratio = own_avg / market_avg;
        let raw = (2.0 - ratio) * 50.0;
        Decimal::from_f64_retain(raw.clamp(0.0, 100.0)).unwrap_or(dec!(50))
    }
}

/// Carrier's appetite breadth on a 0-10 scale: a base of 5, nudged up for
/// filing volume, recency, a moderate rate change, and a broad
/// eligible-class set, and down for a sharp rate swing or an ineligible
/// set wider than the eligible one.
fn appetite_score(
    source_filing_count: i32,
    filed_date: Option<chrono::DateTime<chrono::Utc>>,
    last_rate_change_pct: Option<Decimal>,
    eligible_count: usize,
    ineligible_count: usize,
) -> Decimal {
    let mut score = 5.0_f64;

    score += (source_filing_count as f64 / 5.0).min(1.5);

    if let Some(filed_date) = filed_date {
        let days_ago = (chrono::Utc::now() - filed_date).num_days();
        if days_ago < 180 {
            score += 1.0;
        } else if days_ago < 365 {
            score += 0.5;
        }
    }

    if let Some(pct) = last_rate_change_pct.and_then(|d| d.to_f64()) {
        if (-5.0..=5.0).contains(&pct) {
            score += 0.5;
        } else if pct > 15.0 {
            score -= 1.0;
        } else if pct < -10.0 {
            score -= 0.5;
        }
    }

    if eligible_count > 5 {
        score += 0.5;
    }
    if ineligible_count > eligible_count {
        score -= 0.5;
    }

    Decimal::from_f64_retain(score.clamp(0.0, 10.0)).unwrap_or(dec!(5)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cheaper_than_market_scores_above_fifty() {
        let index = AppetiteProfiler::raw_index_for_test(0.8, 1.0);
        assert!(index > dec!(50));
    }

    #[test]
    fn pricier_than_market_scores_below_fifty() {
        let index = AppetiteProfiler::raw_index_for_test(1.2, 1.0);
        assert!(index < dec!(50));
    }

    #[test]
    fn appetite_score_rewards_volume_recency_and_breadth() {
        let baseline = appetite_score(0, None, None, 0, 0);
        assert_eq!(baseline, dec!(5));

        let recent = chrono::Utc::now() - chrono::Duration::days(30);
        let active = appetite_score(10, Some(recent), Some(dec!(2.0)), 8, 1);
        assert!(active > baseline);
    }

    #[test]
    fn appetite_score_penalizes_sharp_increases_and_wide_ineligibility() {
        let baseline = appetite_score(0, None, None, 0, 0);
        let penalized = appetite_score(0, None, Some(dec!(20.0)), 1, 5);
        assert!(penalized < baseline);
    }

    impl AppetiteProfiler {
        fn raw_index_for_test(own_avg: f64, market_avg: f64) -> Decimal {
            let ratio = own_avg / market_avg;
            let raw = (2.0 - ratio) * 50.0;
            Decimal::from_f64_retain(raw.clamp(0.0, 100.0)).unwrap_or(dec!(50))
        }
    }
}
