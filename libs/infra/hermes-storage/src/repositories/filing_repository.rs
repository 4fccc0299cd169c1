// [libs/infra/hermes-storage/src/repositories/filing_repository.rs]
//! Carriers and rate filing records, including the natural-key
//! supersession transaction described in spec section 4.1: a new filing
//! for the same (carrier, state, tracking_number) marks the prior row
//! `is_current = 0` and links it via `superseded_by` before the new row
//! is inserted, all inside one transaction.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::filing::{Carrier, CarrierStatus, FilingDocument, LineOfBusiness, RateFilingRecord};
use libsql::Connection;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct FilingRepository {
    client: StorageClient,
}

impl FilingRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn upsert_carrier(&self, naic_code: &str, name: &str) -> Result<Carrier, StorageError> {
        let conn = self.client.connection()?;
        if let Some(existing) = self.find_carrier_by_naic(&conn, naic_code).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO carriers (id, naic_code, name, status) VALUES (?1, ?2, ?3, 'active')",
            libsql::params![id.to_string(), naic_code, name],
        )
        .await?;

        Ok(Carrier {
            id,
            naic_code: naic_code.to_string(),
            name: name.to_string(),
            status: CarrierStatus::Active,
            created_at: Utc::now(),
        })
    }

    /// Looks up a carrier by its surrogate id, used by the pricing
    /// engines to attach a display name to a quote.
    #[instrument(skip(self))]
    pub async fn carrier_by_id(&self, carrier_id: Uuid) -> Result<Option<Carrier>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, naic_code, name, status, created_at FROM carriers WHERE id = ?1",
                libsql::params![carrier_id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_carrier(&row)?)),
            None => Ok(None),
        }
    }

    /// Every active carrier, ordered by NAIC code — the scrape
    /// orchestrator's per-state fan-out iterates this set rather than a
    /// hard-coded carrier list.
    #[instrument(skip(self))]
    pub async fn active_carriers(&self) -> Result<Vec<Carrier>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, naic_code, name, status, created_at FROM carriers \
                 WHERE status = 'active' ORDER BY naic_code",
                (),
            )
            .await?;

        let mut carriers = Vec::new();
        while let Some(row) = rows.next().await? {
            carriers.push(map_row_to_carrier(&row)?);
        }
        Ok(carriers)
    }

    async fn find_carrier_by_naic(
        &self,
        conn: &Connection,
        naic_code: &str,
    ) -> Result<Option<Carrier>, StorageError> {
        let mut rows = conn
            .query(
                "SELECT id, naic_code, name, status, created_at FROM carriers WHERE naic_code = ?1",
                libsql::params![naic_code],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_carrier(&row)?)),
            None => Ok(None),
        }
    }

    /// Inserts a newly scraped filing. If a current row already exists for
    /// the same natural key (carrier_id, state, tracking_number), it is
    /// superseded atomically rather than overwritten, preserving history
    /// per the append-only invariant in spec section 3.
    #[instrument(skip(self, raw_metadata))]
    pub async fn record_filing(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        tracking_number: &str,
        filing_type: &str,
        status: &str,
        effective_date: Option<DateTime<Utc>>,
        filed_date: Option<DateTime<Utc>>,
        overall_rate_change_pct: Option<Decimal>,
        raw_metadata: serde_json::Value,
    ) -> Result<RateFilingRecord, StorageError> {
        let mut conn = self.client.connection()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        let existing_id: Option<String> = {
            let mut rows = tx
                .query(
                    "SELECT id FROM rate_filing_records \
                     WHERE carrier_id = ?1 AND state = ?2 AND tracking_number = ?3 AND is_current = 1",
                    libsql::params![carrier_id.to_string(), state, tracking_number],
                )
                .await?;
            match rows.next().await? {
                Some(row) => Some(row.get::<String>(0)?),
                None => None,
            }
        };

        let new_id = Uuid::new_v4();

        if let Some(previous_id) = &existing_id {
            tx.execute(
                "UPDATE rate_filing_records SET is_current = 0, superseded_by = ?1 WHERE id = ?2",
                libsql::params![new_id.to_string(), previous_id.clone()],
            )
            .await?;
        }

        tx.execute(
            "INSERT INTO rate_filing_records \
             (id, carrier_id, state, line_of_business, tracking_number, filing_type, status, \
              effective_date, filed_date, overall_rate_change_pct, raw_metadata, is_current) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)",
            libsql::params![
                new_id.to_string(),
                carrier_id.to_string(),
                state,
                line_of_business_str(line_of_business),
                tracking_number,
                filing_type,
                status,
                effective_date.map(|d| d.to_rfc3339()),
                filed_date.map(|d| d.to_rfc3339()),
                overall_rate_change_pct.map(|d| d.to_string()),
                raw_metadata.to_string(),
            ],
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(RateFilingRecord {
            id: new_id,
            carrier_id,
            state: state.to_string(),
            line_of_business,
            tracking_number: tracking_number.to_string(),
            filing_type: filing_type.to_string(),
            status: status.to_string(),
            effective_date,
            filed_date,
            disposition_date: None,
            summary: None,
            overall_rate_change_pct,
            raw_metadata,
            is_current: true,
            superseded_by: None,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn attach_document(
        &self,
        filing_id: Uuid,
        storage_path: &str,
        mime_type: Option<&str>,
        document_kind: &str,
        checksum_sha256: &str,
    ) -> Result<Uuid, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO filing_documents (id, filing_id, storage_path, mime_type, document_kind, checksum_sha256) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            libsql::params![
                id.to_string(),
                filing_id.to_string(),
                storage_path,
                mime_type,
                document_kind,
                checksum_sha256,
            ],
        )
        .await?;
        Ok(id)
    }

    /// Claims up to `limit` documents that have not yet been parsed,
    /// feeding the parser task's batch-claim loop.
    #[instrument(skip(self))]
    pub async fn claim_unparsed_documents(&self, limit: u32) -> Result<Vec<FilingDocument>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, filing_id, storage_path, mime_type, document_kind, checksum_sha256, \
                 page_count, parsed_at, parse_confidence, created_at \
                 FROM filing_documents WHERE parsed_at IS NULL LIMIT ?1",
                libsql::params![limit],
            )
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(map_row_to_document(&row)?);
        }
        Ok(documents)
    }

    /// Resolves the parent filing for a document, giving parsers the
    /// carrier/state/line/effective-date context they need to write
    /// rate tables and rules under the right foreign keys.
    #[instrument(skip(self))]
    pub async fn filing_for_document(&self, document_id: Uuid) -> Result<Option<RateFilingRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT f.id, f.carrier_id, f.state, f.line_of_business, f.tracking_number, \
                 f.filing_type, f.status, f.effective_date, f.filed_date, f.disposition_date, \
                 f.summary, f.overall_rate_change_pct, f.raw_metadata, f.is_current, \
                 f.superseded_by, f.created_at \
                 FROM filing_documents fd JOIN rate_filing_records f ON f.id = fd.filing_id \
                 WHERE fd.id = ?1",
                libsql::params![document_id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_filing(&row)?)),
            None => Ok(None),
        }
    }

    /// Looks up the current filing for a natural key, used by the
    /// change detector to find the prior row to diff against.
    #[instrument(skip(self))]
    pub async fn find_current_filing(
        &self,
        carrier_id: Uuid,
        state: &str,
        tracking_number: &str,
    ) -> Result<Option<RateFilingRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, tracking_number, filing_type, \
                 status, effective_date, filed_date, disposition_date, summary, \
                 overall_rate_change_pct, raw_metadata, is_current, superseded_by, created_at \
                 FROM rate_filing_records \
                 WHERE carrier_id = ?1 AND state = ?2 AND tracking_number = ?3 AND is_current = 1",
                libsql::params![carrier_id.to_string(), state, tracking_number],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_filing(&row)?)),
            None => Ok(None),
        }
    }

    /// The most recently effective filing for a carrier/state/line,
    /// regardless of tracking number — used by the appetite change
    /// detector, which diffs consecutive filings rather than a single
    /// natural key.
    #[instrument(skip(self))]
    pub async fn latest_filing(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
    ) -> Result<Option<RateFilingRecord>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, tracking_number, filing_type, \
                 status, effective_date, filed_date, disposition_date, summary, \
                 overall_rate_change_pct, raw_metadata, is_current, superseded_by, created_at \
                 FROM rate_filing_records \
                 WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3 AND is_current = 1 \
                 ORDER BY effective_date DESC, filed_date DESC LIMIT 1",
                libsql::params![carrier_id.to_string(), state, line_of_business_str(line_of_business)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_filing(&row)?)),
            None => Ok(None),
        }
    }

    /// Distinct (carrier, state, line) triples with a filing row created
    /// since `since` — feeds the `detect_appetite_shifts` task's fan-out
    /// over "triples updated in the last 24h".
    #[instrument(skip(self))]
    pub async fn triples_with_filings_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, String, LineOfBusiness)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT DISTINCT carrier_id, state, line_of_business FROM rate_filing_records \
                 WHERE created_at >= ?1",
                libsql::params![since.to_rfc3339()],
            )
            .await?;

        let mut triples = Vec::new();
        while let Some(row) = rows.next().await? {
            triples.push((
                parse_uuid(row.get::<String>(0)?)?,
                row.get::<String>(1)?,
                parse_line_of_business(&row.get::<String>(2)?)?,
            ));
        }
        Ok(triples)
    }

    /// Count of withdrawn filings for a natural key created since
    /// `since` — the schema has no `updated_at` column, so `created_at`
    /// is the best available proxy for "updated in the last 7 days".
    #[instrument(skip(self))]
    pub async fn withdrawn_filing_count_recent(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        since: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM rate_filing_records \
                 WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3 \
                 AND status = 'withdrawn' AND created_at >= ?4",
                libsql::params![
                    carrier_id.to_string(),
                    state,
                    line_of_business_str(line_of_business),
                    since.to_rfc3339(),
                ],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Total filings ever recorded for a natural key, current or
    /// superseded — the appetite profiler's source-filing count.
    #[instrument(skip(self))]
    pub async fn filing_count_for_key(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
    ) -> Result<u64, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM rate_filing_records \
                 WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3",
                libsql::params![carrier_id.to_string(), state, line_of_business_str(line_of_business)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Total documents still awaiting a parse pass — the parse-backlog
    /// signal the `health_check` task folds into its degraded/unhealthy
    /// verdict.
    #[instrument(skip(self))]
    pub async fn unparsed_document_count(&self) -> Result<u64, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM filing_documents WHERE parsed_at IS NULL", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    #[instrument(skip(self))]
    pub async fn mark_document_parsed(
        &self,
        document_id: Uuid,
        page_count: u32,
        confidence: rust_decimal::Decimal,
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE filing_documents SET parsed_at = CURRENT_TIMESTAMP, page_count = ?1, \
             parse_confidence = ?2 WHERE id = ?3",
            libsql::params![page_count, confidence.to_string(), document_id.to_string()],
        )
        .await?;
        Ok(())
    }
}

fn line_of_business_str(l: LineOfBusiness) -> &'static str {
    match l {
        LineOfBusiness::Pmi => "pmi",
        LineOfBusiness::Title => "title",
    }
}

fn parse_line_of_business(s: &str) -> Result<LineOfBusiness, StorageError> {
    match s {
        "pmi" => Ok(LineOfBusiness::Pmi),
        "title" => Ok(LineOfBusiness::Title),
        other => Err(StorageError::Mapping(format!("unknown line_of_business: {other}"))),
    }
}

fn map_row_to_carrier(row: &libsql::Row) -> Result<Carrier, StorageError> {
    let status: String = row.get(3)?;
    Ok(Carrier {
        id: parse_uuid(row.get::<String>(0)?)?,
        naic_code: row.get(1)?,
        name: row.get(2)?,
        status: if status == "active" {
            CarrierStatus::Active
        } else {
            CarrierStatus::Inactive
        },
        created_at: parse_timestamp(row.get::<String>(4)?)?,
    })
}

fn map_row_to_filing(row: &libsql::Row) -> Result<RateFilingRecord, StorageError> {
    Ok(RateFilingRecord {
        id: parse_uuid(row.get::<String>(0)?)?,
        carrier_id: parse_uuid(row.get::<String>(1)?)?,
        state: row.get(2)?,
        line_of_business: parse_line_of_business(&row.get::<String>(3)?)?,
        tracking_number: row.get(4)?,
        filing_type: row.get(5)?,
        status: row.get(6)?,
        effective_date: row.get::<Option<String>>(7)?.map(parse_timestamp).transpose()?,
        filed_date: row.get::<Option<String>>(8)?.map(parse_timestamp).transpose()?,
        disposition_date: row.get::<Option<String>>(9)?.map(parse_timestamp).transpose()?,
        summary: row.get(10)?,
        overall_rate_change_pct: row
            .get::<Option<String>>(11)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        raw_metadata: serde_json::from_str(&row.get::<String>(12)?)
            .map_err(|e| StorageError::Mapping(format!("invalid raw_metadata json: {e}")))?,
        is_current: row.get::<i64>(13)? != 0,
        superseded_by: row
            .get::<Option<String>>(14)?
            .map(parse_uuid)
            .transpose()?,
        created_at: parse_timestamp(row.get::<String>(15)?)?,
    })
}

fn map_row_to_document(row: &libsql::Row) -> Result<FilingDocument, StorageError> {
    use hermes_models::filing::DocumentKind;

    let kind_str: String = row.get(4)?;
    let kind = match kind_str.as_str() {
        "rate_page" => DocumentKind::RatePage,
        "rule_manual" => DocumentKind::RuleManual,
        "form_specimen" => DocumentKind::FormSpecimen,
        "cover_letter" => DocumentKind::CoverLetter,
        _ => DocumentKind::Other,
    };

    Ok(FilingDocument {
        id: parse_uuid(row.get::<String>(0)?)?,
        filing_id: parse_uuid(row.get::<String>(1)?)?,
        storage_path: row.get(2)?,
        mime_type: row.get(3)?,
        document_kind: kind,
        checksum_sha256: row.get(5)?,
        page_count: row.get::<Option<i64>>(6)?.map(|v| v as u32),
        parsed_at: row
            .get::<Option<String>>(7)?
            .map(parse_timestamp)
            .transpose()?,
        parse_confidence: row
            .get::<Option<String>>(8)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| StorageError::Mapping(format!("invalid decimal: {e}")))?,
        created_at: parse_timestamp(row.get::<String>(9)?)?,
    })
}

fn parse_uuid(s: String) -> Result<Uuid, StorageError> {
    Uuid::parse_str(&s).map_err(|e| StorageError::Mapping(format!("invalid uuid: {e}")))
}

fn parse_timestamp(s: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Mapping(format!("invalid timestamp: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> StorageClient {
        StorageClient::connect(":memory:", None).await.unwrap()
    }

    #[tokio::test]
    async fn record_filing_supersedes_prior_current_row() {
        let repo = FilingRepository::new(test_client().await);
        let carrier = repo.upsert_carrier("12345", "Acme Mortgage Insurance").await.unwrap();

        let first = repo
            .record_filing(
                carrier.id,
                "TX",
                LineOfBusiness::Pmi,
                "TX-2024-001",
                "rate",
                "approved",
                None,
                None,
                None,
                serde_json::json!({}),
            )
            .await
            .unwrap();

        let second = repo
            .record_filing(
                carrier.id,
                "TX",
                LineOfBusiness::Pmi,
                "TX-2024-001",
                "rate",
                "approved",
                None,
                None,
                None,
                serde_json::json!({"revision": 2}),
            )
            .await
            .unwrap();

        assert!(second.is_current);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn upsert_carrier_is_idempotent_on_naic_code() {
        let repo = FilingRepository::new(test_client().await);
        let a = repo.upsert_carrier("99999", "First Name").await.unwrap();
        let b = repo.upsert_carrier("99999", "Second Name").await.unwrap();
        assert_eq!(a.id, b.id);
    }
}
