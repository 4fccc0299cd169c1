// [libs/domain/hermes-alerts/src/alerts.rs]
//! Converts change signals into actionable alerts, and serves the
//! unread/acknowledge/digest surface the alert manager exposes.

use crate::errors::AlertsError;
use chrono::{DateTime, Utc};
use hermes_models::appetite::{ChangeSignal, SignalKind};
use hermes_storage::repositories::{AppetiteRepository, FilingRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    AppetiteShift,
    RateChange,
    MarketEntry,
    MarketExit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// A structured, actionable alert surfaced from a change signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub carrier_name: String,
    pub state: String,
    pub description: String,
    pub action_recommended: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Groups a digest's signals by severity, highest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDigest {
    pub generated_at: DateTime<Utc>,
    pub total_signals: usize,
    pub high: Vec<Alert>,
    pub medium: Vec<Alert>,
    pub low: Vec<Alert>,
}

fn alert_type_for(kind: SignalKind) -> AlertType {
    match kind {
        SignalKind::RateDecrease | SignalKind::RateIncrease => AlertType::RateChange,
        SignalKind::NewStateEntry => AlertType::MarketEntry,
        SignalKind::FilingWithdrawal => AlertType::MarketExit,
        SignalKind::ExpandedClasses | SignalKind::ContractedClasses | SignalKind::TerritoryExpansion => AlertType::AppetiteShift,
    }
}

fn action_for(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::RateDecrease => "Re-market active submissions for this carrier/state/line — rates may now be more competitive than quoted.",
        SignalKind::RateIncrease => "Review active quotes; new rates may be uncompetitive. Consider re-marketing to alternative carriers.",
        SignalKind::ExpandedClasses => "New class codes now eligible — review pending declines that may qualify.",
        SignalKind::ContractedClasses => "Some class codes no longer eligible — check active submissions for impacted classes.",
        SignalKind::NewStateEntry => "New carrier option available in this state — add to future submissions.",
        SignalKind::FilingWithdrawal => "Carrier withdrawing from market — identify and re-market affected renewals immediately.",
        SignalKind::TerritoryExpansion => "Carrier expanded territory appetite — risks in newly covered areas can now be submitted.",
    }
}

fn describe(signal: &ChangeSignal) -> String {
    match signal.detail.as_object().and_then(|o| o.get("pct_change")).and_then(|v| v.as_f64()) {
        Some(pct) => format!("{:?} shift of {:.2}% in {}", signal.kind, pct, signal.state),
        None => format!("{:?} signal detected in {}", signal.kind, signal.state),
    }
}

fn severity_for(strength: Decimal) -> AlertSeverity {
    if strength >= dec!(70) {
        AlertSeverity::High
    } else if strength >= dec!(40) {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

pub struct AlertManager {
    appetite_repository: AppetiteRepository,
    filing_repository: FilingRepository,
}

impl AlertManager {
    pub fn new(appetite_repository: AppetiteRepository, filing_repository: FilingRepository) -> Self {
        Self { appetite_repository, filing_repository }
    }

    /// Unacknowledged alerts, highest severity first.
    #[instrument(skip(self))]
    pub async fn get_unread(&self) -> Result<Vec<Alert>, AlertsError> {
        let signals = self.appetite_repository.unacknowledged_signals().await?;
        self.to_alerts(signals).await
    }

    #[instrument(skip(self))]
    pub async fn acknowledge(&self, alert_id: Uuid) -> Result<(), AlertsError> {
        let found = self.appetite_repository.acknowledge_signal(alert_id).await?;
        if !found {
            return Err(AlertsError::NotFound(format!("no alert with id {alert_id}")));
        }
        Ok(())
    }

    /// Groups every signal detected in the last 24 hours by severity.
    #[instrument(skip(self))]
    pub async fn daily_digest(&self) -> Result<DailyDigest, AlertsError> {
        let since = Utc::now() - chrono::Duration::hours(24);
        let signals = self.appetite_repository.recent_signals(since).await?;
        let alerts = self.to_alerts(signals).await?;

        let mut digest = DailyDigest { generated_at: Utc::now(), total_signals: alerts.len(), high: Vec::new(), medium: Vec::new(), low: Vec::new() };
        for alert in alerts {
            match alert.severity {
                AlertSeverity::High => digest.high.push(alert),
                AlertSeverity::Medium => digest.medium.push(alert),
                AlertSeverity::Low => digest.low.push(alert),
            }
        }
        Ok(digest)
    }

    async fn to_alerts(&self, signals: Vec<ChangeSignal>) -> Result<Vec<Alert>, AlertsError> {
        let mut names: BTreeMap<Uuid, String> = BTreeMap::new();
        let mut alerts = Vec::with_capacity(signals.len());

        for signal in signals {
            let carrier_name = match names.get(&signal.carrier_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.filing_repository.carrier_by_id(signal.carrier_id).await?.map(|c| c.name).unwrap_or_else(|| "Unknown Carrier".to_string());
                    names.insert(signal.carrier_id, name.clone());
                    name
                }
            };

            // No open-submissions integration exists in this pipeline; the
            // strength boost the alert manager otherwise applies when live
            // submissions are impacted is unconditionally a no-op here.
            let severity = severity_for(signal.strength);
            alerts.push(Alert {
                id: signal.id,
                alert_type: alert_type_for(signal.kind),
                severity,
                carrier_name,
                state: signal.state.clone(),
                description: describe(&signal),
                action_recommended: action_for(signal.kind).to_string(),
                created_at: signal.detected_at,
                acknowledged: signal.acknowledged,
            });
        }

        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.created_at.cmp(&a.created_at)));
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands_match_strength_thresholds() {
        assert_eq!(severity_for(dec!(70)), AlertSeverity::High);
        assert_eq!(severity_for(dec!(69)), AlertSeverity::Medium);
        assert_eq!(severity_for(dec!(40)), AlertSeverity::Medium);
        assert_eq!(severity_for(dec!(10)), AlertSeverity::Low);
    }
}
