// [libs/infra/hermes-storage/src/repositories/scrape_log_repository.rs]
//! Per-run scrape bookkeeping, consulted by the restart/consecutive-error
//! policy in the scrape orchestrator (spec section 4.3).

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::Utc;
use hermes_models::scrape::{ScrapeLog, ScrapeLogStatus};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ScrapeLogRepository {
    client: StorageClient,
}

impl ScrapeLogRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    /// Runs still `running` that started more than `max_age` ago — the
    /// "stuck scrape" signal the `health_check` task folds into its
    /// degraded/unhealthy verdict.
    #[instrument(skip(self))]
    pub async fn stuck_run_count(&self, max_age: chrono::Duration) -> Result<u64, StorageError> {
        let conn = self.client.connection()?;
        let cutoff = Utc::now() - max_age;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM scrape_logs WHERE status = 'running' AND started_at < ?1",
                libsql::params![cutoff.to_rfc3339()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    #[instrument(skip(self))]
    pub async fn start_run(&self, state: &str) -> Result<Uuid, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO scrape_logs (id, state, status) VALUES (?1, ?2, 'running')",
            libsql::params![id.to_string(), state],
        )
        .await?;
        Ok(id)
    }

    #[instrument(skip(self, warnings))]
    pub async fn finish_run(
        &self,
        id: Uuid,
        status: ScrapeLogStatus,
        filings_discovered: u32,
        filings_new: u32,
        documents_downloaded: u32,
        consecutive_errors: u32,
        warnings: &[String],
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE scrape_logs SET status = ?1, filings_discovered = ?2, filings_new = ?3, \
             documents_downloaded = ?4, consecutive_errors = ?5, warnings = ?6, \
             finished_at = CURRENT_TIMESTAMP WHERE id = ?7",
            libsql::params![
                status_str(status),
                filings_discovered,
                filings_new,
                documents_downloaded,
                consecutive_errors,
                serde_json::to_string(warnings).unwrap_or_else(|_| "[]".into()),
                id.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn latest_for_state(&self, state: &str) -> Result<Option<ScrapeLog>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, state, status, filings_discovered, filings_new, documents_downloaded, \
                 consecutive_errors, warnings, started_at, finished_at \
                 FROM scrape_logs WHERE state = ?1 ORDER BY started_at DESC LIMIT 1",
                libsql::params![state],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }
}

fn status_str(s: ScrapeLogStatus) -> &'static str {
    match s {
        ScrapeLogStatus::Running => "running",
        ScrapeLogStatus::Completed => "completed",
        ScrapeLogStatus::FailedBlocked => "failed_blocked",
        ScrapeLogStatus::FailedError => "failed_error",
    }
}

fn map_row(row: &libsql::Row) -> Result<ScrapeLog, StorageError> {
    let status_str: String = row.get(2)?;
    let status = match status_str.as_str() {
        "running" => ScrapeLogStatus::Running,
        "completed" => ScrapeLogStatus::Completed,
        "failed_blocked" => ScrapeLogStatus::FailedBlocked,
        "failed_error" => ScrapeLogStatus::FailedError,
        other => return Err(StorageError::Mapping(format!("unknown scrape log status: {other}"))),
    };

    Ok(ScrapeLog {
        id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        state: row.get(1)?,
        status,
        filings_discovered: row.get::<i64>(3)? as u32,
        filings_new: row.get::<i64>(4)? as u32,
        documents_downloaded: row.get::<i64>(5)? as u32,
        consecutive_errors: row.get::<i64>(6)? as u32,
        warnings: serde_json::from_str(&row.get::<String>(7)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        started_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String>(8)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        finished_at: row
            .get::<Option<String>>(9)?
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| StorageError::Mapping(e.to_string()))
            })
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_run_updates_status() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = ScrapeLogRepository::new(client);
        let id = repo.start_run("TX").await.unwrap();
        repo.finish_run(id, ScrapeLogStatus::Completed, 10, 2, 2, 0, &[])
            .await
            .unwrap();

        let latest = repo.latest_for_state("TX").await.unwrap().unwrap();
        assert_eq!(latest.status, ScrapeLogStatus::Completed);
        assert_eq!(latest.filings_discovered, 10);
    }
}
