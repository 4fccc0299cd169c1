// [libs/domain/hermes-tasks/src/market.rs]
//! `generate_market_report`: one report per state/line that has had
//! filing activity in the trailing window.

use tracing::{instrument, warn};

use crate::deps::Deps;
use crate::errors::TaskError;
use crate::summary::TaskSummary;

const ACTIVITY_WINDOW_DAYS: i64 = 90;
const REPORT_PERIOD_DAYS: i64 = 90;

#[instrument(skip(deps))]
pub async fn generate_market_report(deps: &Deps) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new("generate_market_report");
    let state_lines = deps.market_repository.active_state_lines(ACTIVITY_WINDOW_DAYS).await?;
    summary.set("state_lines", state_lines.len() as u64);

    let generator = deps.market_report_generator();
    for (state, line) in state_lines {
        match generator.generate_report(&state, line, REPORT_PERIOD_DAYS).await {
            Ok(_) => summary.increment("reports_generated", 1),
            Err(e) => {
                warn!(state, "market report generation failed: {e}");
                summary.push_error(format!("{state}: {e}"));
            }
        }
    }

    Ok(summary)
}
