// [libs/domain/hermes-pricing/src/lib.rs]
//! Stateless query-time PMI and Title pricing engines. Both read
//! hand-loaded rate-card reference data through `hermes-storage` and
//! never touch the extraction pipeline's filing records.

mod conditions;
mod errors;
mod pmi;
mod title;

pub use errors::PricingError;
pub use pmi::{AppliedAdjustment, HermesPmiEngine, MarketGridEntry, PmiCarrierQuote, PmiPricingConfig, PmiQuoteRequest, PmiQuoteResponse};
pub use title::{
    HermesTitleEngine, SimultaneousIssueGridEntry, TitleCarrierQuote, TitlePolicyRequest, TitleQuoteRequest, TitleQuoteResponse,
};
