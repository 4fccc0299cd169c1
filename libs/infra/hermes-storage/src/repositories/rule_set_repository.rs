// [libs/infra/hermes-storage/src/repositories/rule_set_repository.rs]
//! Extracted underwriting rule sets, superseded on the same
//! (carrier, state, line_of_business) natural key as rate tables.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::filing::LineOfBusiness;
use hermes_models::rules::RuleSetRecord;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct RuleSetRepository {
    client: StorageClient,
}

impl RuleSetRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, rules))]
    pub async fn record_rule_set(
        &self,
        carrier_id: Uuid,
        filing_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        rules: serde_json::Value,
    ) -> Result<RuleSetRecord, StorageError> {
        let mut conn = self.client.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        let line_str = line_of_business_str(line_of_business);

        tx.execute(
            "UPDATE rule_set_records SET is_current = 0 \
             WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3 AND is_current = 1",
            libsql::params![carrier_id.to_string(), state, line_str],
        )
        .await?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO rule_set_records (id, carrier_id, filing_id, state, line_of_business, rules, is_current) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            libsql::params![
                id.to_string(),
                carrier_id.to_string(),
                filing_id.to_string(),
                state,
                line_str,
                rules.to_string(),
            ],
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(RuleSetRecord {
            id,
            carrier_id,
            filing_id,
            state: state.to_string(),
            line_of_business,
            rules,
            is_current: true,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn current_for_state(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
    ) -> Result<Vec<RuleSetRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, filing_id, state, line_of_business, rules, is_current, created_at \
                 FROM rule_set_records WHERE state = ?1 AND line_of_business = ?2 AND is_current = 1",
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

fn map_row(row: &libsql::Row) -> Result<RuleSetRecord, StorageError> {
    let line_str: String = row.get(4)?;
    Ok(RuleSetRecord {
        id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        carrier_id: Uuid::parse_str(&row.get::<String>(1)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        filing_id: Uuid::parse_str(&row.get::<String>(2)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        state: row.get(3)?,
        line_of_business: match line_str.as_str() {
            "pmi" => LineOfBusiness::Pmi,
            "title" => LineOfBusiness::Title,
            other => return Err(StorageError::Mapping(format!("unknown line: {other}"))),
        },
        rules: serde_json::from_str(&row.get::<String>(5)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        is_current: row.get::<i64>(6)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(7)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_rule_set_supersedes_prior_current_row() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = RuleSetRepository::new(client);
        let carrier_id = Uuid::new_v4();
        let filing_id = Uuid::new_v4();

        let conn = repo.client.connection().unwrap();
        conn.execute(
            "INSERT INTO carriers (id, naic_code, name) VALUES (?1, 'X', 'X')",
            libsql::params![carrier_id.to_string()],
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO rate_filing_records (id, carrier_id, state, line_of_business, \
             tracking_number, filing_type, status) VALUES (?1, ?2, 'TX', 'pmi', 'T1', 'rule', 'approved')",
            libsql::params![filing_id.to_string(), carrier_id.to_string()],
        )
        .await
        .unwrap();

        repo.record_rule_set(carrier_id, filing_id, "TX", LineOfBusiness::Pmi, serde_json::json!([]))
            .await
            .unwrap();
        repo.record_rule_set(carrier_id, filing_id, "TX", LineOfBusiness::Pmi, serde_json::json!([{"a": 1}]))
            .await
            .unwrap();

        let current = repo.current_for_state("TX", LineOfBusiness::Pmi).await.unwrap();
        assert_eq!(current.len(), 1);
    }
}
