//! Per-run scrape bookkeeping — spec section 4.3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeLog {
    pub id: Uuid,
    pub state: String,
    pub status: ScrapeLogStatus,
    pub filings_discovered: u32,
    pub filings_new: u32,
    pub documents_downloaded: u32,
    pub consecutive_errors: u32,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeLogStatus {
    Running,
    Completed,
    FailedBlocked,
    FailedError,
}
