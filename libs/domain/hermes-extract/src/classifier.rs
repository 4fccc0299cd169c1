// [libs/domain/hermes-extract/src/classifier.rs]
//! Guesses a document's kind from its filename, first-page heading, and
//! keyword frequency across the extracted pages. No ML model — a
//! deterministic heuristic.

use crate::text_extractor::ExtractedPage;
use hermes_models::filing::DocumentKind;

const RATE_KEYWORDS: &[&str] = &["rate page", "rate table", "base rate", "rating factor", "territory factor"];
const RULE_KEYWORDS: &[&str] = &["underwriting rule", "eligibility", "manual rule", "classification rule"];
const FORM_KEYWORDS: &[&str] = &["policy form", "endorsement", "declarations", "coverage form"];

/// Classifies a document. `filename` and the extracted `pages` are both
/// consulted; an empty page set always classifies as `Other` with the
/// caller expected to skip parsing.
pub fn classify(filename: &str, pages: &[ExtractedPage]) -> DocumentKind {
    if pages.is_empty() {
        return DocumentKind::Other;
    }

    let lower_name = filename.to_lowercase();
    if let Some(kind) = classify_by_filename(&lower_name) {
        return kind;
    }

    let first_page = pages[0].text.to_lowercase();
    if let Some(kind) = classify_by_heading(&first_page) {
        return kind;
    }

    let combined: String = pages
        .iter()
        .take(3)
        .map(|p| p.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    classify_by_keyword_frequency(&combined)
}

fn classify_by_filename(lower_name: &str) -> Option<DocumentKind> {
    if lower_name.contains("rate") {
        Some(DocumentKind::RatePage)
    } else if lower_name.contains("rule") || lower_name.contains("manual") {
        Some(DocumentKind::RuleManual)
    } else if lower_name.contains("form") || lower_name.contains("endorsement") || lower_name.contains("specimen") {
        Some(DocumentKind::FormSpecimen)
    } else if lower_name.contains("cover") {
        Some(DocumentKind::CoverLetter)
    } else {
        None
    }
}

fn classify_by_heading(first_page_lower: &str) -> Option<DocumentKind> {
    let first_lines: String = first_page_lower.lines().take(5).collect::<Vec<_>>().join(" ");
    if RATE_KEYWORDS.iter().any(|kw| first_lines.contains(kw)) {
        Some(DocumentKind::RatePage)
    } else if RULE_KEYWORDS.iter().any(|kw| first_lines.contains(kw)) {
        Some(DocumentKind::RuleManual)
    } else if FORM_KEYWORDS.iter().any(|kw| first_lines.contains(kw)) {
        Some(DocumentKind::FormSpecimen)
    } else {
        None
    }
}

fn classify_by_keyword_frequency(combined_lower: &str) -> DocumentKind {
    let rate_hits = count_hits(combined_lower, RATE_KEYWORDS);
    let rule_hits = count_hits(combined_lower, RULE_KEYWORDS);
    let form_hits = count_hits(combined_lower, FORM_KEYWORDS);

    let max_hits = rate_hits.max(rule_hits).max(form_hits);
    if max_hits == 0 {
        return DocumentKind::Other;
    }
    if rate_hits == max_hits {
        DocumentKind::RatePage
    } else if rule_hits == max_hits {
        DocumentKind::RuleManual
    } else {
        DocumentKind::FormSpecimen
    }
}

fn count_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(**kw)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> ExtractedPage {
        ExtractedPage {
            page_number: 1,
            text: text.to_string(),
        }
    }

    #[test]
    fn empty_pages_classify_as_other() {
        assert_eq!(classify("whatever.pdf", &[]), DocumentKind::Other);
    }

    #[test]
    fn filename_hint_wins_over_heading() {
        let pages = vec![page("Underwriting Rule Manual, Section 1")];
        assert_eq!(classify("rate_filing_2024.pdf", &pages), DocumentKind::RatePage);
    }

    #[test]
    fn heading_classifies_rule_manual() {
        let pages = vec![page("Underwriting Rule Manual\nEffective 01/01/2024")];
        assert_eq!(classify("attachment_3.pdf", &pages), DocumentKind::RuleManual);
    }

    #[test]
    fn keyword_frequency_falls_back_to_form() {
        let pages = vec![page("This policy form includes an endorsement schedule.")];
        assert_eq!(classify("attachment_9.pdf", &pages), DocumentKind::FormSpecimen);
    }
}
