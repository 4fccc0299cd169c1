// [libs/domain/hermes-tasks/src/appetite.rs]
//! `detect_appetite_shifts` and `recompute_appetite_profiles`: fan out a
//! single-triple domain operation over every (carrier, state, line)
//! touched in the last 24 hours.

use chrono::{Duration, Utc};
use tracing::{instrument, warn};

use crate::deps::Deps;
use crate::errors::TaskError;
use crate::summary::TaskSummary;

const LOOKBACK_HOURS: i64 = 24;

#[instrument(skip(deps))]
pub async fn detect_appetite_shifts(deps: &Deps) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new("detect_appetite_shifts");
    let since = Utc::now() - Duration::hours(LOOKBACK_HOURS);
    let triples = deps.filing_repository.triples_with_filings_since(since).await?;
    summary.set("triples", triples.len() as u64);

    let detector = deps.change_detector();
    for (carrier_id, state, line) in triples {
        match detector.detect_shifts(carrier_id, &state, line).await {
            Ok(signals) => summary.increment("signals_recorded", signals.len() as u64),
            Err(e) => {
                warn!(%carrier_id, state, "shift detection failed: {e}");
                summary.push_error(format!("{carrier_id}/{state}: {e}"));
            }
        }
    }

    Ok(summary)
}

#[instrument(skip(deps))]
pub async fn recompute_appetite_profiles(deps: &Deps) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new("recompute_appetite_profiles");
    let since = Utc::now() - Duration::hours(LOOKBACK_HOURS);
    let triples = deps.rate_table_repository.triples_with_tables_since(since).await?;
    summary.set("triples", triples.len() as u64);

    let profiler = deps.appetite_profiler();
    for (carrier_id, state, line) in triples {
        match profiler.recompute(carrier_id, &state, line).await {
            Ok(_) => summary.increment("recomputed", 1),
            Err(e) => {
                warn!(%carrier_id, state, "profile recompute failed: {e}");
                summary.push_error(format!("{carrier_id}/{state}: {e}"));
            }
        }
    }

    Ok(summary)
}
