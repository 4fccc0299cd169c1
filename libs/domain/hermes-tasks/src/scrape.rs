// [libs/domain/hermes-tasks/src/scrape.rs]
//! `daily_scrape_incremental`, built on the portal navigator primitives:
//! a listing pass per (state, carrier) followed by a bounded-parallelism
//! detail pass with browser-restart and consecutive-error policy.
//! `scrape_title_filings` is a thin parameterization of the same run
//! restricted to Title-line filings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use hermes_models::filing::{Carrier, LineOfBusiness, RateFilingRecord};
use hermes_models::scrape::ScrapeLogStatus;
use hermes_portal::navigator::SearchResultRow;
use hermes_portal::{PortalError, PortalNavigator};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::deps::Deps;
use crate::errors::TaskError;
use crate::summary::TaskSummary;

const BROWSER_RESTART_INTERVAL: u32 = 200;
const CONSECUTIVE_ERROR_THRESHOLD: usize = 18;
const MAX_RESTARTS_AT_SAME_POSITION: u32 = 3;
const DETAIL_PARALLELISM: usize = 2;
const MAX_LISTING_PAGES: u32 = 50;

#[instrument(skip(deps))]
pub async fn daily_scrape_incremental(deps: &Deps) -> Result<TaskSummary, TaskError> {
    run_scrape(deps, "daily_scrape_incremental", None).await
}

/// Thin parameterization of [`daily_scrape_incremental`] restricted to
/// Title-line filings, reusing the same listing/detail pass machinery.
#[instrument(skip(deps))]
pub async fn scrape_title_filings(deps: &Deps) -> Result<TaskSummary, TaskError> {
    run_scrape(deps, "scrape_title_filings", Some(LineOfBusiness::Title)).await
}

async fn run_scrape(deps: &Deps, task_name: &str, line_filter: Option<LineOfBusiness>) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new(task_name);

    for state in deps.settings.scrape_states.clone() {
        match scrape_one_state(deps, &state, line_filter).await {
            Ok(state_summary) => {
                summary.increment("filings_discovered", state_summary.filings_discovered as u64);
                summary.increment("filings_new", state_summary.filings_new as u64);
                summary.increment("documents_downloaded", state_summary.documents_downloaded as u64);
                summary.increment("states_completed", 1);
            }
            Err(e) => {
                warn!(state = %state, error = %e, "scrape run failed for state");
                summary.push_error(format!("{state}: {e}"));
                summary.increment("states_failed", 1);
            }
        }
    }

    Ok(summary)
}

struct StateScrapeSummary {
    filings_discovered: u32,
    filings_new: u32,
    documents_downloaded: u32,
}

async fn scrape_one_state(deps: &Deps, state: &str, line_filter: Option<LineOfBusiness>) -> Result<StateScrapeSummary, TaskError> {
    let run_id = deps.scrape_log_repository.start_run(state).await?;
    let carriers = deps.filing_repository.active_carriers().await?;

    let mut browser_handle = launch_browser(deps.settings.socks_proxy_url.as_deref()).await?;
    let mut discovered = Vec::new();
    let mut filings_discovered = 0u32;
    let mut filings_new = 0u32;

    for carrier in &carriers {
        let rows = match listing_pass(&browser_handle.browser, deps, state, carrier).await {
            Ok(rows) => rows,
            Err(PortalError::Blocked(reason)) => {
                warn!(state, carrier = %carrier.naic_code, %reason, "portal blocked during listing pass, restarting browser");
                tokio::time::sleep(Duration::from_secs(180)).await;
                browser_handle.restart(deps.settings.socks_proxy_url.as_deref()).await?;
                continue;
            }
            Err(e) => {
                warn!(state, carrier = %carrier.naic_code, error = %e, "listing pass failed");
                continue;
            }
        };

        filings_discovered += rows.len() as u32;
        for row in rows {
            let line = infer_line_of_business(&row.filing_type);
            if let Some(filter) = line_filter {
                if line != filter {
                    continue;
                }
            }
            let filing = deps
                .filing_repository
                .record_filing(
                    carrier.id,
                    state,
                    line,
                    &row.tracking_number,
                    &row.filing_type,
                    &row.status,
                    None,
                    None,
                    None,
                    serde_json::json!({"source": "listing", "detail_url": row.detail_url}),
                )
                .await?;
            filings_new += 1;
            discovered.push((carrier.clone(), filing, row.detail_url));
        }
    }

    let detail_summary = detail_pass(&mut browser_handle, deps, state, discovered).await?;

    deps.scrape_log_repository
        .finish_run(
            run_id,
            ScrapeLogStatus::Completed,
            filings_discovered,
            filings_new,
            detail_summary.documents_downloaded,
            detail_summary.consecutive_errors,
            &detail_summary.warnings,
        )
        .await?;

    Ok(StateScrapeSummary {
        filings_discovered,
        filings_new,
        documents_downloaded: detail_summary.documents_downloaded,
    })
}

/// Runs the broad-filter search for one carrier and paginates through
/// every results page, returning the raw rows without visiting detail
/// pages — safe to rerun, per spec's "listing pass is cheap" guarantee.
async fn listing_pass(
    browser: &Browser,
    deps: &Deps,
    state: &str,
    carrier: &Carrier,
) -> Result<Vec<SearchResultRow>, PortalError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| PortalError::Navigation(e.to_string()))?;
    let navigator = PortalNavigator::new(page);

    navigator
        .navigate_to_state_portal(&deps.settings.serff_base_url, state)
        .await?;
    navigator.accept_agreement_if_present().await?;
    navigator.search_filings(&carrier.naic_code).await?;

    let mut rows = Vec::new();
    for _ in 0..MAX_LISTING_PAGES {
        rows.extend(navigator.extract_result_rows().await?);
        if !navigator.advance_page().await? {
            break;
        }
    }
    Ok(rows)
}

struct DetailPassSummary {
    documents_downloaded: u32,
    consecutive_errors: u32,
    warnings: Vec<String>,
}

/// Processes the detail queue with fixed parallelism, restarting the
/// browser every [`BROWSER_RESTART_INTERVAL`] filings and rewinding on a
/// consecutive-error streak, per spec section 4.3.
async fn detail_pass(
    browser_handle: &mut BrowserHandle,
    deps: &Deps,
    state: &str,
    queue: Vec<(Carrier, RateFilingRecord, String)>,
) -> Result<DetailPassSummary, TaskError> {
    let mut documents_downloaded = 0u32;
    let mut consecutive_errors = 0usize;
    let mut warnings = Vec::new();
    let mut processed_since_restart = 0u32;
    let mut restarts_at_position = 0u32;
    let mut last_rewind_index = None;

    let mut index = 0usize;
    while index < queue.len() {
        let end = (index + DETAIL_PARALLELISM).min(queue.len());
        let chunk = &queue[index..end];

        let page = browser_handle
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| TaskError::Browser(e.to_string()))?;
        let navigator = PortalNavigator::new(page);

        let mut batch_had_error = false;
        for (carrier, filing, detail_url) in chunk {
            match process_one_filing(&navigator, deps, state, carrier, filing, detail_url).await {
                Ok(downloaded) => {
                    documents_downloaded += downloaded;
                    consecutive_errors = 0;
                    processed_since_restart += 1;
                }
                Err(e) => {
                    batch_had_error = true;
                    consecutive_errors += 1;
                    warnings.push(format!("{}: {e}", filing.tracking_number));
                    warn!(tracking = %filing.tracking_number, error = %e, "detail pass failed for filing");
                }
            }
        }

        if consecutive_errors >= CONSECUTIVE_ERROR_THRESHOLD {
            let rewound_to = index.saturating_sub(CONSECUTIVE_ERROR_THRESHOLD);
            if last_rewind_index == Some(rewound_to) {
                restarts_at_position += 1;
            } else {
                restarts_at_position = 1;
                last_rewind_index = Some(rewound_to);
            }

            if restarts_at_position > MAX_RESTARTS_AT_SAME_POSITION {
                warn!(state, position = rewound_to, "skipping batch after repeated restarts at the same queue position");
                warnings.push(format!("skipped batch at position {rewound_to} after {MAX_RESTARTS_AT_SAME_POSITION} restarts"));
                index = end;
                consecutive_errors = 0;
                continue;
            }

            info!(state, position = rewound_to, "rewinding detail queue and restarting browser after error streak");
            browser_handle.restart(deps.settings.socks_proxy_url.as_deref()).await?;
            index = rewound_to;
            consecutive_errors = 0;
            processed_since_restart = 0;
            continue;
        }

        if processed_since_restart >= BROWSER_RESTART_INTERVAL {
            browser_handle.restart(deps.settings.socks_proxy_url.as_deref()).await?;
            processed_since_restart = 0;
        }

        if !batch_had_error {
            tokio::time::sleep(deps.settings.scrape_delay).await;
        }

        index = end;
    }

    Ok(DetailPassSummary {
        documents_downloaded,
        consecutive_errors: consecutive_errors as u32,
        warnings,
    })
}

async fn process_one_filing(
    navigator: &PortalNavigator,
    deps: &Deps,
    state: &str,
    carrier: &Carrier,
    filing: &RateFilingRecord,
    detail_url: &str,
) -> Result<u32, TaskError> {
    let detail = navigator.open_detail(detail_url).await.map_err(TaskError::Portal)?;

    let effective_date = detail.effective_date.as_deref().and_then(parse_loose_date);
    let filed_date = detail.filed_date.as_deref().and_then(parse_loose_date);
    let overall_rate_change_pct = detail.overall_rate_change_pct.as_deref().and_then(parse_loose_pct);

    deps.filing_repository
        .record_filing(
            carrier.id,
            state,
            filing.line_of_business,
            &filing.tracking_number,
            &filing.filing_type,
            &filing.status,
            effective_date,
            filed_date,
            overall_rate_change_pct,
            filing.raw_metadata.clone(),
        )
        .await?;

    let mut downloaded = 0u32;
    for (name, url) in &detail.documents {
        let dest = document_path(&deps.settings.filing_storage_path, state, &carrier.naic_code, &filing.tracking_number, name);
        if dest.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            continue;
        }

        let bytes = navigator.download_document(url).await.map_err(TaskError::Portal)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TaskError::Browser(e.to_string()))?;
        }
        std::fs::write(&dest, &bytes).map_err(|e| TaskError::Browser(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let checksum = hex::encode(hasher.finalize());

        deps.filing_repository
            .attach_document(filing.id, &dest.to_string_lossy(), None, "other", &checksum)
            .await?;
        info!(tracking = %filing.tracking_number, checksum, "downloaded filing document");
        downloaded += 1;
    }

    Ok(downloaded)
}

fn infer_line_of_business(filing_type: &str) -> LineOfBusiness {
    if filing_type.to_lowercase().contains("title") {
        LineOfBusiness::Title
    } else {
        LineOfBusiness::Pmi
    }
}

fn parse_loose_date(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}

/// Parses a scraped "+3.2%" / "-1.5" / "3.2" cell into a signed percentage.
fn parse_loose_pct(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    let normalized = trimmed.strip_prefix('+').unwrap_or(trimmed);
    normalized.parse::<Decimal>().ok()
}

/// `{root}/{state}/{naic}/{tracking}/{sanitized_name}`, with every
/// character outside `[A-Za-z0-9 _.-]` replaced by `_` and the filename
/// trimmed to 200 characters.
fn document_path(root: &str, state: &str, naic: &str, tracking: &str, filename: &str) -> PathBuf {
    let sanitized: String = filename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-') { c } else { '_' })
        .take(200)
        .collect();
    let sanitized = if sanitized.is_empty() { "document".to_string() } else { sanitized };

    Path::new(root).join(state).join(naic).join(tracking).join(sanitized)
}

struct BrowserHandle {
    browser: Browser,
    driver: tokio::task::JoinHandle<()>,
}

impl BrowserHandle {
    async fn restart(&mut self, socks_proxy: Option<&str>) -> Result<(), TaskError> {
        self.driver.abort();
        *self = launch_browser(socks_proxy).await?;
        Ok(())
    }
}

async fn launch_browser(socks_proxy: Option<&str>) -> Result<BrowserHandle, TaskError> {
    let mut builder = BrowserConfig::builder();
    if let Some(proxy) = socks_proxy {
        builder = builder.arg(format!("--proxy-server=socks5://{proxy}"));
    }
    let config = builder.build().map_err(TaskError::Browser)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| TaskError::Browser(e.to_string()))?;

    let driver = tokio::spawn(async move {
        while handler.next().await.is_some() {}
    });

    Ok(BrowserHandle { browser, driver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_title_line_from_filing_type() {
        assert_eq!(infer_line_of_business("Title Insurance Rate Filing"), LineOfBusiness::Title);
        assert_eq!(infer_line_of_business("Mortgage Guaranty Rate"), LineOfBusiness::Pmi);
    }

    #[test]
    fn sanitizes_and_truncates_document_filenames() {
        let path = document_path("/data", "TX", "12345", "TX-2024-001", "weird/name?.pdf");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "weird_name_.pdf");
    }

    #[test]
    fn empty_sanitized_filename_falls_back_to_placeholder() {
        let path = document_path("/data", "TX", "12345", "TX-2024-001", "###");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "document");
    }

    #[test]
    fn parses_signed_percentage_cells() {
        use rust_decimal_macros::dec;
        assert_eq!(parse_loose_pct("+3.2%"), Some(dec!(3.2)));
        assert_eq!(parse_loose_pct("-1.5"), Some(dec!(-1.5)));
        assert_eq!(parse_loose_pct("not a number"), None);
    }
}
