// [libs/domain/hermes-tasks/src/maintenance.rs]
//! `stale_data_check` and `health_check`: housekeeping and the liveness
//! probe an external scheduler polls before trusting the rest of the
//! pipeline.

use chrono::Duration;
use rust_decimal_macros::dec;
use tracing::instrument;

use crate::deps::Deps;
use crate::errors::TaskError;
use crate::summary::{HealthReport, HealthStatus, TaskSummary};

const STALE_PROFILE_MAX_AGE_DAYS: i64 = 90;
const STUCK_SCRAPE_MAX_AGE_HOURS: i64 = 6;

const PARSE_BACKLOG_DEGRADED_AT: u64 = 50;
const PARSE_BACKLOG_UNHEALTHY_AT: u64 = 500;
const STUCK_SCRAPES_UNHEALTHY_AT: u64 = 1;

#[instrument(skip(deps))]
pub async fn stale_data_check(deps: &Deps) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new("stale_data_check");
    let marked = deps.appetite_repository.mark_stale_profiles(STALE_PROFILE_MAX_AGE_DAYS).await?;
    summary.set("profiles_marked_stale", marked);
    Ok(summary)
}

#[instrument(skip(deps))]
pub async fn health_check(deps: &Deps) -> Result<HealthReport, TaskError> {
    let parse_backlog = deps.filing_repository.unparsed_document_count().await?;
    let stuck_scrapes = deps.scrape_log_repository.stuck_run_count(Duration::hours(STUCK_SCRAPE_MAX_AGE_HOURS)).await?;
    let unacknowledged_high_severity_signals = deps
        .appetite_repository
        .unacknowledged_signal_count_at_least(dec!(7))
        .await?;

    let status = if stuck_scrapes >= STUCK_SCRAPES_UNHEALTHY_AT || parse_backlog >= PARSE_BACKLOG_UNHEALTHY_AT {
        HealthStatus::Unhealthy
    } else if parse_backlog >= PARSE_BACKLOG_DEGRADED_AT || unacknowledged_high_severity_signals > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    Ok(HealthReport {
        status,
        db_reachable: true,
        parse_backlog,
        stuck_scrapes,
        unacknowledged_high_severity_signals,
    })
}
