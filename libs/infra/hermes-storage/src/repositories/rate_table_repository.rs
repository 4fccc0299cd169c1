// [libs/infra/hermes-storage/src/repositories/rate_table_repository.rs]
//! Extracted rate tables and the (unexecuted) premium algorithm blob,
//! superseded on the same (carrier, state, line_of_business) natural key
//! as rate filing records.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::filing::LineOfBusiness;
use hermes_models::pricing::RateTableRecord;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct RateTableRepository {
    client: StorageClient,
}

impl RateTableRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, rows))]
    pub async fn record_rate_table(
        &self,
        carrier_id: Uuid,
        filing_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        effective_date: DateTime<Utc>,
        rows: serde_json::Value,
    ) -> Result<RateTableRecord, StorageError> {
        let mut conn = self.client.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        let line_str = line_of_business_str(line_of_business);

        tx.execute(
            "UPDATE rate_table_records SET is_current = 0 \
             WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3 AND is_current = 1",
            libsql::params![carrier_id.to_string(), state, line_str],
        )
        .await?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO rate_table_records \
             (id, carrier_id, filing_id, state, line_of_business, effective_date, rows, is_current) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            libsql::params![
                id.to_string(),
                carrier_id.to_string(),
                filing_id.to_string(),
                state,
                line_str,
                effective_date.to_rfc3339(),
                rows.to_string(),
            ],
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(RateTableRecord {
            id,
            carrier_id,
            filing_id,
            state: state.to_string(),
            line_of_business,
            effective_date,
            rows,
            is_current: true,
            created_at: Utc::now(),
        })
    }

    /// The most recent rows for a natural key, current row first — used
    /// by the appetite change detector to diff a filing against its
    /// predecessor without needing to track supersession chains itself.
    #[instrument(skip(self))]
    pub async fn recent_for_key(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        limit: u32,
    ) -> Result<Vec<RateTableRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, filing_id, state, line_of_business, effective_date, rows, \
                 is_current, created_at \
                 FROM rate_table_records WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3 \
                 ORDER BY created_at DESC LIMIT ?4",
                libsql::params![carrier_id.to_string(), state, line_of_business_str(line_of_business), limit],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(map_row(&row)?);
        }
        Ok(results)
    }

    /// Distinct (carrier, state, line) triples with a rate table parsed
    /// since `since` — feeds the `recompute_appetite_profiles` task's
    /// fan-out over "triples with documents parsed in the last 24h".
    #[instrument(skip(self))]
    pub async fn triples_with_tables_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, String, LineOfBusiness)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT DISTINCT carrier_id, state, line_of_business FROM rate_table_records \
                 WHERE created_at >= ?1",
                libsql::params![since.to_rfc3339()],
            )
            .await?;

        let mut triples = Vec::new();
        while let Some(row) = rows.next().await? {
            let line_str: String = row.get(2)?;
            triples.push((
                Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
                row.get::<String>(1)?,
                match line_str.as_str() {
                    "pmi" => LineOfBusiness::Pmi,
                    "title" => LineOfBusiness::Title,
                    other => return Err(StorageError::Mapping(format!("unknown line: {other}"))),
                },
            ));
        }
        Ok(triples)
    }

    #[instrument(skip(self))]
    pub async fn current_for_state(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
    ) -> Result<Vec<RateTableRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, filing_id, state, line_of_business, effective_date, rows, \
                 is_current, created_at \
                 FROM rate_table_records WHERE state = ?1 AND line_of_business = ?2 AND is_current = 1",
                libsql::params![state, line_of_business_str(line_of_business)],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(map_row(&row)?);
        }
        Ok(results)
    }
}

fn line_of_business_str(l: LineOfBusiness) -> &'static str {
    match l {
        LineOfBusiness::Pmi => "pmi",
        LineOfBusiness::Title => "title",
    }
}

fn map_row(row: &libsql::Row) -> Result<RateTableRecord, StorageError> {
    let line_str: String = row.get(4)?;
    Ok(RateTableRecord {
        id: Uuid::parse_str(&row.get::<String>(0)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        carrier_id: Uuid::parse_str(&row.get::<String>(1)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        filing_id: Uuid::parse_str(&row.get::<String>(2)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        state: row.get(3)?,
        line_of_business: match line_str.as_str() {
            "pmi" => LineOfBusiness::Pmi,
            "title" => LineOfBusiness::Title,
            other => return Err(StorageError::Mapping(format!("unknown line: {other}"))),
        },
        effective_date: DateTime::parse_from_rfc3339(&row.get::<String>(5)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        rows: serde_json::from_str(&row.get::<String>(6)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        is_current: row.get::<i64>(7)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(8)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_rate_table_supersedes_prior_current_row() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = RateTableRepository::new(client);
        let carrier_id = Uuid::new_v4();
        let filing_id = Uuid::new_v4();

        // seed a carrier row to satisfy the foreign key
        let conn = repo.client.connection().unwrap();
        conn.execute(
            "INSERT INTO carriers (id, naic_code, name) VALUES (?1, 'X', 'X')",
            libsql::params![carrier_id.to_string()],
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO rate_filing_records (id, carrier_id, state, line_of_business, \
             tracking_number, filing_type, status) VALUES (?1, ?2, 'TX', 'pmi', 'T1', 'rate', 'approved')",
            libsql::params![filing_id.to_string(), carrier_id.to_string()],
        )
        .await
        .unwrap();

        repo.record_rate_table(carrier_id, filing_id, "TX", LineOfBusiness::Pmi, Utc::now(), serde_json::json!([]))
            .await
            .unwrap();
        repo.record_rate_table(carrier_id, filing_id, "TX", LineOfBusiness::Pmi, Utc::now(), serde_json::json!([1]))
            .await
            .unwrap();

        let current = repo.current_for_state("TX", LineOfBusiness::Pmi).await.unwrap();
        assert_eq!(current.len(), 1);
    }
}
