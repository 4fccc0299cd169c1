// [libs/domain/hermes-alerts/src/lib.rs]
mod alerts;
mod errors;
mod market_report;

pub use alerts::{Alert, AlertManager, AlertSeverity, AlertType, DailyDigest};
pub use errors::AlertsError;
pub use market_report::{MarketReport, MarketReportGenerator, MarketTrend};
