// [libs/infra/hermes-storage/src/repositories/parse_log_repository.rs]
//! Per-document parse logs and the low-confidence review queue — both
//! append-only, both written on a best-effort basis so a logging
//! failure never fails the parse itself (the caller is expected to
//! log-and-continue on error, matching spec section 4.5).

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::parse::{ParseLog, ParseReviewItem, ParseStatus, ParserType, ReviewPriority};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ParseLogRepository {
    client: StorageClient,
}

impl ParseLogRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, errors, warnings))]
    pub async fn write_log(&self, log: &ParseLog) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO parse_logs \
             (id, document_id, parser_type, tables_extracted, rules_extracted, forms_extracted, \
              factors_extracted, confidence_avg, confidence_min, ai_calls_made, ai_tokens_used, \
              errors, warnings, duration_seconds, status, started_at, finished_at) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
            libsql::params![
                log.id.to_string(),
                log.document_id.to_string(),
                parser_type_str(log.parser_type),
                log.tables_extracted,
                log.rules_extracted,
                log.forms_extracted,
                log.factors_extracted,
                log.confidence_avg.to_string(),
                log.confidence_min.to_string(),
                log.ai_calls_made,
                log.ai_tokens_used,
                serde_json::to_string(&log.errors).unwrap_or_else(|_| "[]".to_string()),
                serde_json::to_string(&log.warnings).unwrap_or_else(|_| "[]".to_string()),
                log.duration_seconds.to_string(),
                parse_status_str(log.status),
                log.started_at.to_rfc3339(),
                log.finished_at.map(|d| d.to_rfc3339()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Queues a low-confidence field for human review. Fire-and-forget by
    /// contract: callers log a warning on `Err` and move on rather than
    /// failing the surrounding parse.
    #[instrument(skip(self, extracted_value, context_text))]
    pub async fn queue_review_item(
        &self,
        document_id: Uuid,
        table_name: &str,
        field_name: &str,
        extracted_value: &str,
        confidence: rust_decimal::Decimal,
        context_text: &str,
    ) -> Result<ParseReviewItem, StorageError> {
        let priority = ReviewPriority::from_confidence(confidence);
        let id = Uuid::new_v4();
        let truncated_context: String = context_text.chars().take(2000).collect();

        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO parse_review_queue \
             (id, document_id, table_name, field_name, extracted_value, confidence, \
              context_text, review_priority) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            libsql::params![
                id.to_string(),
                document_id.to_string(),
                table_name,
                field_name,
                extracted_value,
                confidence.to_string(),
                truncated_context.clone(),
                review_priority_str(priority),
            ],
        )
        .await?;

        Ok(ParseReviewItem {
            id,
            document_id,
            table_name: table_name.to_string(),
            field_name: field_name.to_string(),
            extracted_value: extracted_value.to_string(),
            confidence,
            context_text: truncated_context,
            review_priority: priority,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn pending_review_items(&self, limit: u32) -> Result<Vec<ParseReviewItem>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, document_id, table_name, field_name, extracted_value, confidence, \
                 context_text, review_priority, created_at FROM parse_review_queue \
                 ORDER BY CASE review_priority WHEN 'high' THEN 0 ELSE 1 END, created_at LIMIT ?1",
                libsql::params![limit],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(map_review_row(&row)?);
        }
        Ok(items)
    }
}

fn parser_type_str(p: ParserType) -> &'static str {
    match p {
        ParserType::Rate => "rate",
        ParserType::Rule => "rule",
        ParserType::Form => "form",
    }
}

fn parse_status_str(s: ParseStatus) -> &'static str {
    match s {
        ParseStatus::Completed => "completed",
        ParseStatus::Partial => "partial",
        ParseStatus::Failed => "failed",
    }
}

fn review_priority_str(p: ReviewPriority) -> &'static str {
    match p {
        ReviewPriority::High => "high",
        ReviewPriority::Medium => "medium",
    }
}

fn map_review_row(row: &libsql::Row) -> Result<ParseReviewItem, StorageError> {
    let priority_str: String = row.get(7)?;
    Ok(ParseReviewItem {
        id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        document_id: Uuid::parse_str(&row.get::<String>(1)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        table_name: row.get(2)?,
        field_name: row.get(3)?,
        extracted_value: row.get(4)?,
        confidence: row
            .get::<String>(5)?
            .parse()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        context_text: row.get(6)?,
        review_priority: if priority_str == "high" {
            ReviewPriority::High
        } else {
            ReviewPriority::Medium
        },
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(8)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_models::filing::LineOfBusiness;
    use rust_decimal_macros::dec;

    async fn test_client() -> StorageClient {
        StorageClient::connect(":memory:", None).await.unwrap()
    }

    async fn seed_document(client: &StorageClient) -> Uuid {
        use crate::repositories::filing_repository::FilingRepository;
        let filing_repo = FilingRepository::new(client.clone());
        let carrier = filing_repo.upsert_carrier("11111", "Acme").await.unwrap();
        let filing = filing_repo
            .record_filing(
                carrier.id,
                "TX",
                LineOfBusiness::Pmi,
                "TX-1",
                "rate",
                "approved",
                None,
                None,
                None,
                serde_json::json!({}),
            )
            .await
            .unwrap();
        filing_repo
            .attach_document(filing.id, "/tmp/x.pdf", Some("application/pdf"), "rate_page", "deadbeef")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn queue_review_item_routes_priority_by_confidence() {
        let client = test_client().await;
        let document_id = seed_document(&client).await;
        let repo = ParseLogRepository::new(client);

        let high = repo
            .queue_review_item(document_id, "rate_tables", "base_rate", "0.42", dec!(0.40), "context")
            .await
            .unwrap();
        assert_eq!(high.review_priority, ReviewPriority::High);

        let medium = repo
            .queue_review_item(document_id, "rate_tables", "base_rate", "0.60", dec!(0.60), "context")
            .await
            .unwrap();
        assert_eq!(medium.review_priority, ReviewPriority::Medium);
    }

    #[tokio::test]
    async fn write_log_persists_failed_status() {
        let client = test_client().await;
        let document_id = seed_document(&client).await;
        let repo = ParseLogRepository::new(client);

        let log = ParseLog {
            id: Uuid::new_v4(),
            document_id,
            parser_type: ParserType::Rate,
            tables_extracted: 0,
            rules_extracted: 0,
            forms_extracted: 0,
            factors_extracted: 0,
            confidence_avg: dec!(0),
            confidence_min: dec!(0),
            ai_calls_made: 0,
            ai_tokens_used: 0,
            errors: vec!["PDF not found".to_string()],
            warnings: vec![],
            duration_seconds: dec!(0.05),
            status: ParseStatus::Failed,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
        };

        repo.write_log(&log).await.unwrap();
    }
}
