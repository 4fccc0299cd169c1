// [libs/domain/hermes-alerts/src/market_report.rs]
//! Periodic market intelligence reports: filing activity, rate-change
//! trend, and the carriers entering or leaving a state/line over a
//! rolling window.

use crate::errors::AlertsError;
use chrono::{DateTime, Utc};
use hermes_models::appetite::ChangeSignal;
use hermes_models::filing::LineOfBusiness;
use hermes_storage::repositories::MarketRepository;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    Hardening,
    Softening,
    Mixed,
    Stable,
}

impl MarketTrend {
    fn as_str(&self) -> &'static str {
        match self {
            MarketTrend::Hardening => "hardening",
            MarketTrend::Softening => "softening",
            MarketTrend::Mixed => "mixed",
            MarketTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketReport {
    pub state: String,
    pub line_of_business: LineOfBusiness,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub avg_rate_change_pct: Option<f64>,
    pub median_rate_change_pct: Option<f64>,
    pub filing_count: u32,
    pub rate_increases: u32,
    pub rate_decreases: u32,
    pub new_entrants: Vec<String>,
    pub withdrawals: Vec<String>,
    pub market_trend: MarketTrend,
    pub summary: String,
}

pub struct MarketReportGenerator {
    market_repository: MarketRepository,
}

impl MarketReportGenerator {
    pub fn new(market_repository: MarketRepository) -> Self {
        Self { market_repository }
    }

    /// Computes and persists a report for the trailing `period_days` days.
    #[instrument(skip(self))]
    pub async fn generate_report(&self, state: &str, line: LineOfBusiness, period_days: i64) -> Result<MarketReport, AlertsError> {
        let period_end = Utc::now();
        let period_start = period_end - chrono::Duration::days(period_days);

        let filings = self.market_repository.filings_in_window(state, line, period_start, period_end).await?;
        let filing_count = filings.len() as u32;
        let withdrawals: Vec<String> = filings.iter().filter(|f| f.status == "withdrawn").map(|f| f.carrier_name.clone()).collect();

        let prior_carriers = self.market_repository.carriers_with_prior_filing(state, line, period_start).await?;
        let mut new_entrants: Vec<String> = filings
            .iter()
            .filter(|f| !prior_carriers.contains(&f.carrier_id))
            .map(|f| f.carrier_name.clone())
            .collect();
        new_entrants.sort();
        new_entrants.dedup();

        let top_signals = self.market_repository.top_signals_in_window(state, line, period_start, period_end).await?;
        let (rate_increases, rate_decreases, avg_rate_change_pct, median_rate_change_pct) = rate_change_stats(&top_signals);

        let market_trend = classify_trend(avg_rate_change_pct, &new_entrants, &withdrawals, rate_increases, rate_decreases);
        let summary = build_summary(state, line, market_trend, avg_rate_change_pct, new_entrants.len(), withdrawals.len());

        let top_signals_json = serde_json::to_value(
            top_signals
                .iter()
                .map(|s| serde_json::json!({"kind": s.kind, "strength": s.strength.to_string(), "carrier_id": s.carrier_id}))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| AlertsError::NotFound(e.to_string()))?;

        self.market_repository
            .upsert_report(
                state,
                line,
                period_start,
                period_end,
                avg_rate_change_pct,
                median_rate_change_pct,
                filing_count,
                rate_increases,
                rate_decreases,
                &new_entrants,
                &withdrawals,
                &top_signals_json,
                market_trend.as_str(),
                &summary,
            )
            .await?;

        Ok(MarketReport {
            state: state.to_string(),
            line_of_business: line,
            period_start,
            period_end,
            avg_rate_change_pct,
            median_rate_change_pct,
            filing_count,
            rate_increases,
            rate_decreases,
            new_entrants,
            withdrawals,
            market_trend,
            summary,
        })
    }

    /// The most recently stored trend for a state/line, without recomputing
    /// a full report.
    #[instrument(skip(self))]
    pub async fn get_trend(&self, state: &str, line: LineOfBusiness) -> Result<Option<MarketTrend>, AlertsError> {
        let stored = self.market_repository.latest_trend(state, line).await?;
        Ok(stored.map(|s| match s.as_str() {
            "hardening" => MarketTrend::Hardening,
            "softening" => MarketTrend::Softening,
            "mixed" => MarketTrend::Mixed,
            _ => MarketTrend::Stable,
        }))
    }
}

/// Extracts rate-change percentages from signal detail JSON — keyed off
/// the change detector's own `rate_increase`/`rate_decrease` signals so the
/// report reflects only the filings that crossed a detection threshold,
/// not every filing in the window.
fn rate_change_stats(signals: &[ChangeSignal]) -> (u32, u32, Option<f64>, Option<f64>) {
    use hermes_models::appetite::SignalKind;

    let mut increases = 0u32;
    let mut decreases = 0u32;
    let mut pct_changes = Vec::new();

    for signal in signals {
        match signal.kind {
            SignalKind::RateIncrease => increases += 1,
            SignalKind::RateDecrease => decreases += 1,
            _ => continue,
        }
        if let Some(pct) = signal.detail.as_object().and_then(|o| o.get("pct_change")).and_then(|v| v.as_f64()) {
            pct_changes.push(pct);
        }
    }

    if pct_changes.is_empty() {
        return (increases, decreases, None, None);
    }

    let avg = pct_changes.iter().sum::<f64>() / pct_changes.len() as f64;
    let mut sorted = pct_changes.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] };

    (increases, decreases, Some(avg), Some(median))
}

fn classify_trend(avg_rate_change_pct: Option<f64>, new_entrants: &[String], withdrawals: &[String], increases: u32, decreases: u32) -> MarketTrend {
    if let Some(avg) = avg_rate_change_pct {
        if avg > 5.0 {
            return MarketTrend::Hardening;
        }
        if avg < -5.0 {
            return MarketTrend::Softening;
        }
    }

    if withdrawals.len() as i64 >= new_entrants.len() as i64 + 2 {
        return MarketTrend::Hardening;
    }
    if new_entrants.len() as i64 >= withdrawals.len() as i64 + 2 {
        return MarketTrend::Softening;
    }

    let total = increases + decreases;
    if total > 0 {
        let increase_pct = increases as f64 / total as f64;
        if increase_pct > 0.6 {
            return MarketTrend::Hardening;
        }
        if increase_pct < 0.4 {
            return MarketTrend::Softening;
        }
        if (0.35..=0.65).contains(&increase_pct) && total >= 5 {
            return MarketTrend::Mixed;
        }
    }

    MarketTrend::Stable
}

fn build_summary(state: &str, line: LineOfBusiness, trend: MarketTrend, avg_rate_change_pct: Option<f64>, new_entrant_count: usize, withdrawal_count: usize) -> String {
    let line_label = match line {
        LineOfBusiness::Pmi => "PMI",
        LineOfBusiness::Title => "title",
    };

    let trend_clause = match trend {
        MarketTrend::Hardening => "the market is hardening, with carriers raising rates or pulling back capacity",
        MarketTrend::Softening => "the market is softening, with carriers cutting rates or expanding appetite",
        MarketTrend::Mixed => "signals are mixed, with carriers moving in both directions",
        MarketTrend::Stable => "the market is holding stable with no dominant directional shift",
    };

    let mut summary = format!("Over the reporting period, the {line_label} market in {state}: {trend_clause}.");

    if let Some(avg) = avg_rate_change_pct {
        summary.push_str(&format!(" Average rate change among filings with a detected shift was {avg:.1}%."));
    }
    if new_entrant_count > 0 {
        summary.push_str(&format!(" {new_entrant_count} carrier(s) entered the market."));
    }
    if withdrawal_count > 0 {
        summary.push_str(&format!(" {withdrawal_count} carrier(s) withdrew."));
    }
    if new_entrant_count == 0 && withdrawal_count == 0 && avg_rate_change_pct.is_none() {
        summary.push_str(" No appetite shifts were detected in this window.");
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_avg_increase_is_hardening() {
        assert_eq!(classify_trend(Some(6.0), &[], &[], 0, 0), MarketTrend::Hardening);
    }

    #[test]
    fn large_avg_decrease_is_softening() {
        assert_eq!(classify_trend(Some(-6.0), &[], &[], 0, 0), MarketTrend::Softening);
    }

    #[test]
    fn withdrawals_outpacing_entrants_is_hardening() {
        let withdrawals = vec!["A".to_string(), "B".to_string()];
        assert_eq!(classify_trend(None, &[], &withdrawals, 0, 0), MarketTrend::Hardening);
    }

    #[test]
    fn entrants_outpacing_withdrawals_is_softening() {
        let entrants = vec!["A".to_string(), "B".to_string()];
        assert_eq!(classify_trend(None, &entrants, &[], 0, 0), MarketTrend::Softening);
    }

    #[test]
    fn balanced_high_volume_signals_is_mixed() {
        assert_eq!(classify_trend(None, &[], &[], 3, 3), MarketTrend::Mixed);
    }

    #[test]
    fn no_signals_is_stable() {
        assert_eq!(classify_trend(None, &[], &[], 0, 0), MarketTrend::Stable);
    }
}
