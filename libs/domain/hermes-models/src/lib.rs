//! Shared domain entities for the Hermes pipeline — the single source of
//! truth consumed by storage, extraction, pricing, and the task surface.

pub mod filing;
pub mod pricing;
pub mod appetite;
pub mod forms;
pub mod parse;
pub mod quote_log;
pub mod rate_cards;
pub mod rules;
pub mod scrape;

pub use appetite::{AppetiteProfile, ChangeSignal, SignalKind};
pub use filing::{Carrier, FilingDocument, RateFilingRecord};
pub use forms::{FormProvision, FormType, PolicyFormRecord, ProvisionType};
pub use parse::{ParseLog, ParseReviewItem, ParseStatus, ParserType, ReviewPriority};
pub use pricing::{CarrierRanking, PremiumAlgorithm, RateTableRecord};
pub use quote_log::{PmiQuoteLogEntry, TitleQuoteLogEntry};
pub use rate_cards::{
    AdjustmentMethod, PmiAdjustment, PmiRateCard, PmiRateCell, PolicyType, PremiumType, TitleEndorsement,
    TitleRateBand, TitleRateCard, TitleReissueCreditTier, TitleSimultaneousIssueBand,
};
pub use rules::RuleSetRecord;
pub use scrape::{ScrapeLog, ScrapeLogStatus};
