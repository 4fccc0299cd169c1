// [libs/infra/hermes-storage/src/repositories/quote_log_repository.rs]
//! Append-only pricing call audit trail, written fire-and-forget by
//! both pricing engines after a quote is assembled.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::Utc;
use hermes_models::quote_log::{PmiQuoteLogEntry, TitleQuoteLogEntry};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct QuoteLogRepository {
    client: StorageClient,
}

impl QuoteLogRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, request, response_summary))]
    pub async fn log_pmi_quote(
        &self,
        request: serde_json::Value,
        response_summary: serde_json::Value,
        carriers_quoted: u32,
        best_rate_pct: Option<Decimal>,
        best_carrier_id: Option<Uuid>,
        processing_time_ms: Decimal,
    ) -> Result<PmiQuoteLogEntry, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO pmi_quote_log \
             (id, request, response_summary, carriers_quoted, best_rate_pct, best_carrier_id, processing_time_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            libsql::params![
                id.to_string(),
                request.to_string(),
                response_summary.to_string(),
                carriers_quoted,
                best_rate_pct.map(|d| d.to_string()),
                best_carrier_id.map(|c| c.to_string()),
                processing_time_ms.to_string(),
            ],
        )
        .await?;

        Ok(PmiQuoteLogEntry {
            id,
            request,
            response_summary,
            carriers_quoted,
            best_rate_pct,
            best_carrier_id,
            processing_time_ms,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self, request, response_summary))]
    pub async fn log_title_quote(
        &self,
        request: serde_json::Value,
        response_summary: serde_json::Value,
        carriers_quoted: u32,
        best_premium: Option<Decimal>,
        best_carrier_id: Option<Uuid>,
        processing_time_ms: Decimal,
    ) -> Result<TitleQuoteLogEntry, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO title_quote_log \
             (id, request, response_summary, carriers_quoted, best_premium, best_carrier_id, processing_time_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            libsql::params![
                id.to_string(),
                request.to_string(),
                response_summary.to_string(),
                carriers_quoted,
                best_premium.map(|d| d.to_string()),
                best_carrier_id.map(|c| c.to_string()),
                processing_time_ms.to_string(),
            ],
        )
        .await?;

        Ok(TitleQuoteLogEntry {
            id,
            request,
            response_summary,
            carriers_quoted,
            best_premium,
            best_carrier_id,
            processing_time_ms,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn logs_a_pmi_quote() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = QuoteLogRepository::new(client);
        let entry = repo
            .log_pmi_quote(serde_json::json!({"ltv": 92.5}), serde_json::json!({"quotes": 3}), 3, Some(dec!(0.52)), None, dec!(12.4))
            .await
            .unwrap();
        assert_eq!(entry.carriers_quoted, 3);
    }
}
