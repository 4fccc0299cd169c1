// [libs/infra/hermes-storage/src/repositories/market_repository.rs]
//! Cross-carrier queries over filings for one (state, line) market —
//! filing counts, new entrants, and withdrawals for a rolling window.
//! Backs the market report generator; rate-change statistics come from
//! `AppetiteRepository::top_signals_in_window` instead of a per-filing
//! rate-change column, since this schema has none.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::filing::LineOfBusiness;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct MarketRepository {
    client: StorageClient,
}

/// One filing's bearing on a market report: whether it was withdrawn,
/// and which carrier made it.
pub struct FilingWindowRow {
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub status: String,
}

impl MarketRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    /// Every filing for a state/line filed within the window, with its
    /// carrier's display name.
    #[instrument(skip(self))]
    pub async fn filings_in_window(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<FilingWindowRow>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT f.carrier_id, c.name, f.status \
                 FROM rate_filing_records f JOIN carriers c ON c.id = f.carrier_id \
                 WHERE f.state = ?1 AND f.line_of_business = ?2 \
                   AND f.filed_date BETWEEN ?3 AND ?4",
                libsql::params![state, line_of_business_str(line_of_business), since.to_rfc3339(), until.to_rfc3339()],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(FilingWindowRow {
                carrier_id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
                carrier_name: row.get(1)?,
                status: row.get(2)?,
            });
        }
        Ok(results)
    }

    /// Carriers with a filing for this state/line strictly before
    /// `before` — the complement defines new entrants for a window.
    #[instrument(skip(self))]
    pub async fn carriers_with_prior_filing(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
        before: DateTime<Utc>,
    ) -> Result<std::collections::HashSet<Uuid>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT DISTINCT carrier_id FROM rate_filing_records \
                 WHERE state = ?1 AND line_of_business = ?2 AND filed_date < ?3",
                libsql::params![state, line_of_business_str(line_of_business), before.to_rfc3339()],
            )
            .await?;

        let mut ids = std::collections::HashSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?);
        }
        Ok(ids)
    }

    /// Distinct (state, line) pairs with at least one filing in the last
    /// `window_days` days — drives the `generate_market_report` task's
    /// fan-out.
    #[instrument(skip(self))]
    pub async fn active_state_lines(&self, window_days: i64) -> Result<Vec<(String, LineOfBusiness)>, StorageError> {
        let conn = self.client.connection()?;
        let since = Utc::now() - chrono::Duration::days(window_days);
        let mut rows = conn
            .query(
                "SELECT DISTINCT state, line_of_business FROM rate_filing_records WHERE filed_date >= ?1",
                libsql::params![since.to_rfc3339()],
            )
            .await?;

        let mut pairs = Vec::new();
        while let Some(row) = rows.next().await? {
            let line_str: String = row.get(1)?;
            let line = match line_str.as_str() {
                "pmi" => LineOfBusiness::Pmi,
                "title" => LineOfBusiness::Title,
                other => return Err(StorageError::Mapping(format!("unknown line_of_business: {other}"))),
            };
            pairs.push((row.get::<String>(0)?, line));
        }
        Ok(pairs)
    }

    /// Upserts a computed report, keyed on (state, line, period_start,
    /// period_end) — rerunning the same window is idempotent.
    #[instrument(skip(self, new_entrants, withdrawals, top_signals, summary))]
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_report(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        avg_rate_change_pct: Option<f64>,
        median_rate_change_pct: Option<f64>,
        filing_count: u32,
        rate_increase_count: u32,
        rate_decrease_count: u32,
        new_entrants: &[String],
        withdrawals: &[String],
        top_signals: &serde_json::Value,
        market_trend: &str,
        summary: &str,
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO market_intelligence \
             (id, state, line_of_business, period_start, period_end, avg_rate_change_pct, \
              median_rate_change_pct, filing_count, rate_increase_count, rate_decrease_count, \
              new_entrants, withdrawals, top_signals, market_trend, summary) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            libsql::params![
                Uuid::new_v4().to_string(),
                state,
                line_of_business_str(line_of_business),
                period_start.to_rfc3339(),
                period_end.to_rfc3339(),
                avg_rate_change_pct,
                median_rate_change_pct,
                filing_count,
                rate_increase_count,
                rate_decrease_count,
                serde_json::to_string(new_entrants).map_err(|e| StorageError::Mapping(e.to_string()))?,
                serde_json::to_string(withdrawals).map_err(|e| StorageError::Mapping(e.to_string()))?,
                top_signals.to_string(),
                market_trend,
                summary,
            ],
        )
        .await?;
        Ok(())
    }

    /// The most recently computed trend for a state/line, if any report
    /// has ever been generated.
    #[instrument(skip(self))]
    pub async fn latest_trend(&self, state: &str, line_of_business: LineOfBusiness) -> Result<Option<String>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT market_trend FROM market_intelligence \
                 WHERE state = ?1 AND line_of_business = ?2 ORDER BY computed_at DESC LIMIT 1",
                libsql::params![state, line_of_business_str(line_of_business)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

fn line_of_business_str(l: LineOfBusiness) -> &'static str {
    match l {
        LineOfBusiness::Pmi => "pmi",
        LineOfBusiness::Title => "title",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> StorageClient {
        StorageClient::connect(":memory:", None).await.unwrap()
    }

    #[tokio::test]
    async fn active_state_lines_is_empty_with_no_filings() {
        let repo = MarketRepository::new(test_client().await);
        let pairs = repo.active_state_lines(90).await.unwrap();
        assert!(pairs.is_empty());
    }
}
