// [libs/domain/hermes-tasks/src/parse.rs]
//! `parse_new_filings`: claims unparsed documents, classifies each, and
//! routes it to the parser matching its kind. `parse_title_filings`
//! runs the identical pipeline restricted to Title-line documents.

use hermes_extract::{classify, DocumentParser, FormParser, RateParser, RuleParser, TextExtractor};
use hermes_models::filing::{DocumentKind, LineOfBusiness};
use hermes_models::parse::ParseStatus;
use tracing::{instrument, warn};

use crate::deps::Deps;
use crate::errors::TaskError;
use crate::summary::TaskSummary;

const CLAIM_BATCH_SIZE: u32 = 100;

#[instrument(skip(deps))]
pub async fn parse_new_filings(deps: &Deps) -> Result<TaskSummary, TaskError> {
    claim_and_parse(deps, "parse_new_filings", None).await
}

/// Thin parameterization of [`parse_new_filings`] restricted to Title-line
/// documents, reusing the same claim/classify/route pipeline.
#[instrument(skip(deps))]
pub async fn parse_title_filings(deps: &Deps) -> Result<TaskSummary, TaskError> {
    claim_and_parse(deps, "parse_title_filings", Some(LineOfBusiness::Title)).await
}

async fn claim_and_parse(deps: &Deps, task_name: &str, line_filter: Option<LineOfBusiness>) -> Result<TaskSummary, TaskError> {
    let mut summary = TaskSummary::new(task_name);
    let documents = deps.filing_repository.claim_unparsed_documents(CLAIM_BATCH_SIZE).await?;
    summary.set("claimed", documents.len() as u64);

    let extractor = TextExtractor::new();

    for document in documents {
        let Some(filing) = deps.filing_repository.filing_for_document(document.id).await? else {
            summary.push_warning(format!("document {} has no parent filing", document.id));
            continue;
        };

        if let Some(line) = line_filter {
            if filing.line_of_business != line {
                continue;
            }
        }

        let path = std::path::Path::new(&document.storage_path);
        let pages = match extractor.extract_pages(path) {
            Ok(pages) => pages,
            Err(e) => {
                summary.push_error(format!("{}: {e}", document.id));
                summary.increment("failed", 1);
                continue;
            }
        };

        let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
        let kind = classify(&filename, &pages);

        let result = match kind {
            DocumentKind::RatePage => {
                let mut parser = RateParser::new(
                    deps.llm_client.clone(),
                    deps.filing_repository.clone(),
                    deps.rate_table_repository.clone(),
                    deps.parse_log_repository.clone(),
                );
                Some(parser.parse(document.id, path).await)
            }
            DocumentKind::RuleManual => {
                let mut parser = RuleParser::new(
                    deps.llm_client.clone(),
                    deps.filing_repository.clone(),
                    deps.rule_set_repository.clone(),
                    deps.parse_log_repository.clone(),
                );
                Some(parser.parse(document.id, path).await)
            }
            DocumentKind::FormSpecimen => {
                let mut parser = FormParser::new(
                    deps.llm_client.clone(),
                    deps.filing_repository.clone(),
                    deps.form_repository.clone(),
                    deps.parse_log_repository.clone(),
                );
                Some(parser.parse(document.id, path).await)
            }
            DocumentKind::CoverLetter | DocumentKind::Other => {
                summary.increment("skipped_unclassified", 1);
                None
            }
        };

        let Some(result) = result else { continue };

        match result.status {
            ParseStatus::Completed | ParseStatus::Partial => {
                deps.filing_repository
                    .mark_document_parsed(document.id, pages.len() as u32, result.confidence_avg)
                    .await?;
                summary.increment("parsed", 1);
                if result.status == ParseStatus::Partial {
                    summary.increment("partial", 1);
                }
            }
            ParseStatus::Failed => {
                summary.increment("failed", 1);
                warn!(document_id = %document.id, "parse failed, leaving document unflagged for retry");
            }
        }

        for warning in result.warnings {
            summary.push_warning(warning);
        }
        for error in result.errors {
            summary.push_error(error);
        }
    }

    Ok(summary)
}
