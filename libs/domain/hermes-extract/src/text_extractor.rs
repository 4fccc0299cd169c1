// [libs/domain/hermes-extract/src/text_extractor.rs]
//! Per-page PDF text extraction. Pure-Rust via `pdf-extract` — no OCR and
//! no native PDF renderer, so a scanned page with no text layer yields
//! an empty string rather than an error.

use crate::errors::ExtractError;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub page_number: u32,
    pub text: String,
}

pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts one `ExtractedPage` per PDF page. A document that decodes
    /// with zero recoverable text (a scanned image with no text layer)
    /// returns an empty vector rather than an error — the caller treats
    /// that as "other"/skip, not a failure.
    pub fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, ExtractError> {
        let raw_pages = pdf_extract::extract_text_by_pages(path).map_err(|source| ExtractError::PdfRead {
            path: path.display().to_string(),
            source,
        })?;

        let pages: Vec<ExtractedPage> = raw_pages
            .into_iter()
            .enumerate()
            .map(|(idx, text)| ExtractedPage {
                page_number: (idx + 1) as u32,
                text,
            })
            .filter(|page| !page.text.trim().is_empty())
            .collect();

        if pages.is_empty() {
            warn!(path = %path.display(), "PDF yielded no extractable text");
        }

        Ok(pages)
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}
