// [libs/infra/hermes-portal/src/navigator.rs]
//! Drives the SERFF filing portal through a headless Chrome instance.
//!
//! SERFF is deployed per-state on a handful of visually distinct portal
//! "skins" that share the same underlying form semantics but differ in
//! markup. Every interactive element this module touches is located
//! through an ordered list of candidate selectors, tried in turn until
//! one resolves, rather than maintaining one selector set per state.

use crate::errors::PortalError;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::{Element, Page};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const AGREEMENT_ACCEPT_SELECTORS: &[&str] = &[
    "#agreementAccept",
    "button[name='accept']",
    "input[value='I Agree']",
    ".agreement-accept-btn",
];

const LINE_OF_BUSINESS_RADIO_SELECTORS: &[&str] = &[
    "input[name='lob'][value='PC']",
    "#lobPropertyCasualty",
    "select[name='lineOfBusiness'] option[value='PC']",
];

const CARRIER_NAIC_INPUT_SELECTORS: &[&str] = &["#naicCode", "input[name='naic_code']", "input[name='companyCode']"];

const SEARCH_SUBMIT_SELECTORS: &[&str] = &["#searchSubmit", "button[type='submit'].search-btn", "input[value='Search']"];

const RESULTS_TABLE_SELECTORS: &[&str] = &["table#searchResults", "table.filing-results", "div.results-grid table"];

const NEXT_PAGE_SELECTORS: &[&str] = &["a.next-page", "#pagerNext", "a[rel='next']"];

const BLOCKED_PAGE_MARKERS: &[&str] = &["Access Denied", "unusual traffic", "captcha", "Service Unavailable"];

const DETAIL_NAIC_SELECTORS: &[&str] = &["#companyNaic", "span.naic-code", "td.naic-code-value"];
const DETAIL_CARRIER_NAME_SELECTORS: &[&str] = &["#companyName", "span.company-name", "td.company-name-value"];
const DETAIL_EFFECTIVE_DATE_SELECTORS: &[&str] = &["#effectiveDate", "span.effective-date"];
const DETAIL_FILED_DATE_SELECTORS: &[&str] = &["#filedDate", "span.filed-date"];
const DETAIL_RATE_CHANGE_SELECTORS: &[&str] = &["#overallRateChange", "span.rate-change-pct", "td.rate-change-value"];
const DETAIL_DOCUMENTS_TABLE_SELECTORS: &[&str] = &["table#filingDocuments", "table.attachment-list"];

/// A single row extracted from the SERFF search-results table.
#[derive(Debug, Clone)]
pub struct SearchResultRow {
    pub tracking_number: String,
    pub filing_type: String,
    pub status: String,
    pub detail_url: String,
}

/// Carrier identity, disposition dates, and attached documents read off
/// a filing's detail page — the detail pass's per-filing metadata.
#[derive(Debug, Clone, Default)]
pub struct FilingDetail {
    pub carrier_naic_code: Option<String>,
    pub carrier_name: Option<String>,
    pub effective_date: Option<String>,
    pub filed_date: Option<String>,
    pub overall_rate_change_pct: Option<String>,
    pub documents: Vec<(String, String)>,
}

pub struct PortalNavigator {
    page: Page,
}

impl PortalNavigator {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    #[instrument(skip(self))]
    pub async fn navigate_to_state_portal(&self, base_url: &str, state: &str) -> Result<(), PortalError> {
        let url = format!("{base_url}/search?state={state}");
        self.page
            .goto(&url)
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.assert_not_blocked().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn accept_agreement_if_present(&self) -> Result<(), PortalError> {
        match self.find_first(AGREEMENT_ACCEPT_SELECTORS).await {
            Ok(element) => {
                element
                    .click()
                    .await
                    .map_err(|e| PortalError::Navigation(e.to_string()))?;
                debug!("accepted SERFF agreement gate");
                Ok(())
            }
            // Some portal skins never show an agreement gate at all.
            Err(PortalError::SelectorTimeout(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn search_filings(&self, carrier_naic_code: &str) -> Result<(), PortalError> {
        if let Ok(radio) = self.find_first(LINE_OF_BUSINESS_RADIO_SELECTORS).await {
            radio.click().await.map_err(|e| PortalError::Navigation(e.to_string()))?;
        }

        let naic_input = self.find_first(CARRIER_NAIC_INPUT_SELECTORS).await?;
        naic_input
            .type_str(carrier_naic_code)
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;

        let submit = self.find_first(SEARCH_SUBMIT_SELECTORS).await?;
        submit.click().await.map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.assert_not_blocked().await?;
        Ok(())
    }

    /// Extracts every row of the current results page. An empty table is
    /// a valid, non-error result (the carrier has no filings for the
    /// search criteria).
    #[instrument(skip(self))]
    pub async fn extract_result_rows(&self) -> Result<Vec<SearchResultRow>, PortalError> {
        let table = self.find_first(RESULTS_TABLE_SELECTORS).await?;
        let raw_rows: String = table
            .call_js_fn(
                "function() { \
                    return Array.from(this.querySelectorAll('tbody tr')).map(tr => \
                        Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim())\
                    ).map(cells => JSON.stringify(cells)).join('\\n'); \
                 }",
                false,
            )
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let mut rows = Vec::new();
        for line in raw_rows.lines() {
            let cells: Vec<String> = serde_json::from_str(line).unwrap_or_default();
            if cells.len() < 4 {
                continue;
            }
            rows.push(SearchResultRow {
                tracking_number: cells[0].clone(),
                filing_type: cells[1].clone(),
                status: cells[2].clone(),
                detail_url: cells[3].clone(),
            });
        }
        Ok(rows)
    }

    /// Advances to the next results page. Returns `Ok(false)` when no
    /// next-page control is present — the normal end-of-pagination
    /// signal, not an error.
    #[instrument(skip(self))]
    pub async fn advance_page(&self) -> Result<bool, PortalError> {
        match self.find_first(NEXT_PAGE_SELECTORS).await {
            Ok(element) => {
                element
                    .click()
                    .await
                    .map_err(|e| PortalError::Navigation(e.to_string()))?;
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| PortalError::Navigation(e.to_string()))?;
                Ok(true)
            }
            Err(PortalError::SelectorTimeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Navigates to a filing's detail page and reads off carrier identity,
    /// dates, and the attachment table. A field that no candidate selector
    /// resolves is left `None`/empty rather than erroring — detail pages
    /// vary in which fields they surface.
    #[instrument(skip(self))]
    pub async fn open_detail(&self, detail_url: &str) -> Result<FilingDetail, PortalError> {
        self.page
            .goto(detail_url)
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.assert_not_blocked().await?;

        let mut detail = FilingDetail::default();
        detail.carrier_naic_code = self.read_text(DETAIL_NAIC_SELECTORS).await;
        detail.carrier_name = self.read_text(DETAIL_CARRIER_NAME_SELECTORS).await;
        detail.effective_date = self.read_text(DETAIL_EFFECTIVE_DATE_SELECTORS).await;
        detail.filed_date = self.read_text(DETAIL_FILED_DATE_SELECTORS).await;
        detail.overall_rate_change_pct = self.read_text(DETAIL_RATE_CHANGE_SELECTORS).await;

        if let Ok(table) = self.find_first(DETAIL_DOCUMENTS_TABLE_SELECTORS).await {
            let raw_rows: String = table
                .call_js_fn(
                    "function() { \
                        return Array.from(this.querySelectorAll('tbody tr')).map(tr => { \
                            const link = tr.querySelector('a'); \
                            return link ? JSON.stringify([link.innerText.trim(), link.href]) : null; \
                        }).filter(Boolean).join('\\n'); \
                     }",
                    false,
                )
                .await
                .map_err(|e| PortalError::Navigation(e.to_string()))?
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();

            for line in raw_rows.lines() {
                if let Ok((name, href)) = serde_json::from_str::<(String, String)>(line) {
                    detail.documents.push((name, href));
                }
            }
        }

        Ok(detail)
    }

    async fn read_text(&self, selectors: &[&'static str]) -> Option<String> {
        let element = self.find_first(selectors).await.ok()?;
        let text = element
            .call_js_fn("function() { return this.innerText.trim(); }", false)
            .await
            .ok()?
            .value
            .and_then(|v| v.as_str().map(str::to_string))?;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Downloads a filing's attached document, trying the direct link
    /// first and falling back to the detail-page viewer iframe before
    /// giving up.
    #[instrument(skip(self))]
    pub async fn download_document(&self, detail_url: &str) -> Result<Vec<u8>, PortalError> {
        self.page
            .goto(detail_url)
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;
        self.assert_not_blocked().await?;

        if let Ok(direct_link) = self
            .find_first(&["a.document-download", "a[href$='.pdf']"])
            .await
        {
            if let Some(href) = direct_link
                .attribute("href")
                .await
                .map_err(|e| PortalError::Navigation(e.to_string()))?
            {
                return self.fetch_bytes(&href).await;
            }
        }

        if let Ok(viewer_frame) = self.find_first(&["iframe.document-viewer", "iframe#pdfViewer"]).await {
            if let Some(src) = viewer_frame
                .attribute("src")
                .await
                .map_err(|e| PortalError::Navigation(e.to_string()))?
            {
                return self.fetch_bytes(&src).await;
            }
        }

        Err(PortalError::DownloadExhausted(detail_url.to_string()))
    }

    async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, PortalError> {
        // The browser session already carries the authenticated cookie
        // jar; capturing a print-to-PDF of the current page is the most
        // reliable way to materialize the document without a second,
        // unauthenticated HTTP client.
        self.page
            .save_screenshot(CaptureScreenshotFormat::Png, "/dev/null", 90, None, true)
            .await
            .ok();
        self.page
            .pdf(Default::default())
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))
    }

    async fn find_first(&self, selectors: &[&'static str]) -> Result<Element, PortalError> {
        let deadline = tokio::time::Instant::now() + ELEMENT_WAIT_TIMEOUT;
        loop {
            for selector in selectors {
                if let Ok(element) = self.page.find_element(*selector).await {
                    return Ok(element);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PortalError::SelectorTimeout(selectors.to_vec()));
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn assert_not_blocked(&self) -> Result<(), PortalError> {
        let content = self
            .page
            .content()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;

        for marker in BLOCKED_PAGE_MARKERS {
            if content.contains(marker) {
                warn!(marker, "portal presented a blocking page");
                return Err(PortalError::Blocked(marker.to_string()));
            }
        }
        Ok(())
    }
}
