//! Document classification, PDF text extraction, and the rate/rule/form
//! parser pipeline.

pub mod classifier;
pub mod errors;
pub mod parsers;
pub mod text_extractor;

pub use classifier::classify;
pub use errors::ExtractError;
pub use parsers::{ConfidenceTracker, DocumentParser, FormParser, ParseResult, RateParser, RuleParser};
pub use text_extractor::{ExtractedPage, TextExtractor};
