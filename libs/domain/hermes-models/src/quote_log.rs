//! Append-only pricing call audit trail — spec section 3's QuoteLog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PmiQuoteLogEntry {
    pub id: Uuid,
    pub request: serde_json::Value,
    pub response_summary: serde_json::Value,
    pub carriers_quoted: u32,
    pub best_rate_pct: Option<Decimal>,
    pub best_carrier_id: Option<Uuid>,
    pub processing_time_ms: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleQuoteLogEntry {
    pub id: Uuid,
    pub request: serde_json::Value,
    pub response_summary: serde_json::Value,
    pub carriers_quoted: u32,
    pub best_premium: Option<Decimal>,
    pub best_carrier_id: Option<Uuid>,
    pub processing_time_ms: Decimal,
    pub created_at: DateTime<Utc>,
}
