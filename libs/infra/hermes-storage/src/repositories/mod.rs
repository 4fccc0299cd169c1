// [libs/infra/hermes-storage/src/repositories/mod.rs]
//! Repository barrel: only the authority structs are exposed outside
//! this crate, keeping SQL and row-mapping details encapsulated.

pub mod filing_repository;
pub mod rate_table_repository;
pub mod rule_set_repository;
pub mod form_repository;
pub mod appetite_repository;
pub mod market_repository;
pub mod parse_log_repository;
pub mod pmi_rate_repository;
pub mod quote_log_repository;
pub mod scrape_log_repository;
pub mod title_rate_repository;

pub use appetite_repository::AppetiteRepository;
pub use filing_repository::FilingRepository;
pub use form_repository::FormRepository;
pub use market_repository::{FilingWindowRow, MarketRepository};
pub use parse_log_repository::ParseLogRepository;
pub use pmi_rate_repository::PmiRateRepository;
pub use quote_log_repository::QuoteLogRepository;
pub use rate_table_repository::RateTableRepository;
pub use rule_set_repository::RuleSetRepository;
pub use scrape_log_repository::ScrapeLogRepository;
pub use title_rate_repository::TitleRateRepository;
