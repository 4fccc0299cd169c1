// [libs/domain/hermes-pricing/src/title.rs]
//! Title insurance pricing: tiered coverage-band premiums, simultaneous
//! issue discounts, refinance reissue credits, and endorsement fees.

use crate::errors::PricingError;
use futures::future::join_all;
use hermes_models::rate_cards::PolicyType;
use hermes_storage::repositories::{FilingRepository, QuoteLogRepository, TitleRateRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TitlePolicyRequest {
    Owner,
    Lender,
    Simultaneous,
}

impl From<TitlePolicyRequest> for PolicyType {
    fn from(value: TitlePolicyRequest) -> Self {
        match value {
            TitlePolicyRequest::Owner => PolicyType::Owner,
            TitlePolicyRequest::Lender => PolicyType::Lender,
            TitlePolicyRequest::Simultaneous => PolicyType::Simultaneous,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleQuoteRequest {
    pub state: String,
    pub insured_amount: Decimal,
    pub policy_type: TitlePolicyRequest,
    #[serde(default)]
    pub loan_amount: Decimal,
    #[serde(default)]
    pub is_refinance: bool,
    #[serde(default)]
    pub years_since_prior_policy: Option<Decimal>,
    #[serde(default)]
    pub endorsement_codes: Vec<String>,
    #[serde(default)]
    pub carrier_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleCarrierQuote {
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub is_promulgated: bool,
    pub owner_premium: Option<Decimal>,
    pub lender_premium: Option<Decimal>,
    pub simultaneous_discount: Decimal,
    pub reissue_credit: Decimal,
    pub endorsement_fees: Decimal,
    pub total_premium: Decimal,
    pub rate_card_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleQuoteResponse {
    pub request_id: Uuid,
    pub state: String,
    pub insured_amount: Decimal,
    pub policy_type: TitlePolicyRequest,
    pub carriers_quoted: u32,
    pub quotes: Vec<TitleCarrierQuote>,
    pub best: Option<TitleCarrierQuote>,
    pub processing_time_ms: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimultaneousIssueGridEntry {
    pub loan_amount: Decimal,
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub lender_premium_standalone: Decimal,
    pub lender_premium_simultaneous: Decimal,
}

fn grid_loan_amounts() -> [Decimal; 7] {
    [dec!(200000), dec!(300000), dec!(380000), dec!(400000), dec!(500000), dec!(750000), dec!(1000000)]
}

pub struct HermesTitleEngine {
    filing_repository: FilingRepository,
    title_rate_repository: TitleRateRepository,
    quote_log_repository: QuoteLogRepository,
}

impl HermesTitleEngine {
    pub fn new(filing_repository: FilingRepository, title_rate_repository: TitleRateRepository, quote_log_repository: QuoteLogRepository) -> Self {
        Self { filing_repository, title_rate_repository, quote_log_repository }
    }

    #[instrument(skip(self, request))]
    pub async fn price_policy(&self, request: TitleQuoteRequest) -> Result<TitleQuoteResponse, PricingError> {
        let started = Instant::now();
        if request.insured_amount <= dec!(0) {
            return Err(PricingError::Validation("insured_amount must be positive".into()));
        }

        let carriers = self
            .title_rate_repository
            .carriers_with_current_cards(&request.state, request.carrier_ids.as_deref())
            .await?;

        let quotes = join_all(carriers.iter().map(|(carrier_id, is_promulgated)| self.price_carrier(*carrier_id, *is_promulgated, &request)))
            .await
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        let best = quotes.iter().min_by(|a, b| a.total_premium.cmp(&b.total_premium)).cloned();
        let carriers_quoted = quotes.len() as u32;
        let processing_time_ms = elapsed_ms(started);

        let response = TitleQuoteResponse {
            request_id: Uuid::new_v4(),
            state: request.state.clone(),
            insured_amount: request.insured_amount,
            policy_type: request.policy_type,
            carriers_quoted,
            quotes,
            best,
            processing_time_ms,
        };

        self.log_quote(&request, &response);
        Ok(response)
    }

    pub async fn quick_quote(&self, state: &str, insured_amount: Decimal, policy_type: TitlePolicyRequest) -> Result<TitleQuoteResponse, PricingError> {
        self.price_policy(TitleQuoteRequest {
            state: state.to_string(),
            insured_amount,
            policy_type,
            loan_amount: dec!(0),
            is_refinance: false,
            years_since_prior_policy: None,
            endorsement_codes: Vec::new(),
            carrier_ids: None,
        })
        .await
    }

    /// Per-carrier, per-loan-amount lender premium shown standalone vs.
    /// simultaneous with an owner's policy — the comparison grid that
    /// demonstrates the simultaneous-issue discount.
    #[instrument(skip(self))]
    pub async fn simultaneous_issue_grid(&self, state: &str) -> Result<Vec<SimultaneousIssueGridEntry>, PricingError> {
        let carriers = self.title_rate_repository.carriers_with_current_cards(state, None).await?;
        let mut entries = Vec::new();

        for (carrier_id, _promulgated) in &carriers {
            let carrier_name = self
                .filing_repository
                .carrier_by_id(*carrier_id)
                .await?
                .map(|c| c.name)
                .unwrap_or_else(|| carrier_id.to_string());

            for loan_amount in grid_loan_amounts() {
                let Some(standalone) = self.tiered_premium(*carrier_id, state, PolicyType::Lender, loan_amount).await? else {
                    continue;
                };
                let discount = self.simultaneous_discount(*carrier_id, state, loan_amount, standalone).await?;
                entries.push(SimultaneousIssueGridEntry {
                    loan_amount,
                    carrier_id: *carrier_id,
                    carrier_name: carrier_name.clone(),
                    lender_premium_standalone: standalone,
                    lender_premium_simultaneous: (standalone - discount).max(dec!(0)),
                });
            }
        }
        Ok(entries)
    }

    async fn price_carrier(&self, carrier_id: Uuid, is_promulgated: bool, request: &TitleQuoteRequest) -> Option<TitleCarrierQuote> {
        let policy_type: PolicyType = request.policy_type.into();

        let owner_premium = if matches!(policy_type, PolicyType::Owner | PolicyType::Simultaneous) {
            self.tiered_premium(carrier_id, &request.state, PolicyType::Owner, request.insured_amount).await.ok()?
        } else {
            None
        };
        let lender_premium = if matches!(policy_type, PolicyType::Lender | PolicyType::Simultaneous) {
            self.tiered_premium(carrier_id, &request.state, PolicyType::Lender, request.insured_amount).await.ok()?
        } else {
            None
        };

        if owner_premium.is_none() && lender_premium.is_none() {
            return None;
        }

        let simultaneous_discount = if policy_type == PolicyType::Simultaneous && request.loan_amount > dec!(0) {
            match lender_premium {
                Some(lender) => self.simultaneous_discount(carrier_id, &request.state, request.loan_amount, lender).await.ok()?,
                None => dec!(0),
            }
        } else {
            dec!(0)
        };

        let reissue_credit = if request.is_refinance {
            match request.years_since_prior_policy {
                Some(years) => self.reissue_credit(carrier_id, &request.state, years, owner_premium.or(lender_premium)).await.ok()?,
                None => dec!(0),
            }
        } else {
            dec!(0)
        };

        let endorsement_fees = self.endorsement_fees(carrier_id, &request.state, &request.endorsement_codes, owner_premium.or(lender_premium).unwrap_or_default()).await.ok()?;

        let base_total = match policy_type {
            PolicyType::Owner => owner_premium.unwrap_or_default(),
            PolicyType::Lender => lender_premium.unwrap_or_default(),
            PolicyType::Simultaneous => owner_premium.unwrap_or_default() + (lender_premium.unwrap_or_default() - simultaneous_discount).max(dec!(0)),
        };
        let total_premium = (base_total - reissue_credit + endorsement_fees).max(dec!(0));

        let source = self
            .title_rate_repository
            .card_meta(carrier_id, &request.state)
            .await
            .ok()?
            .map(|(source, _effective)| source)
            .unwrap_or_default();

        let carrier_name = self
            .filing_repository
            .carrier_by_id(carrier_id)
            .await
            .ok()?
            .map(|c| c.name)
            .unwrap_or_else(|| carrier_id.to_string());

        Some(TitleCarrierQuote {
            carrier_id,
            carrier_name,
            is_promulgated,
            owner_premium,
            lender_premium,
            simultaneous_discount,
            reissue_credit,
            endorsement_fees,
            total_premium,
            rate_card_source: source,
        })
    }

    async fn tiered_premium(&self, carrier_id: Uuid, state: &str, policy_type: PolicyType, insured_amount: Decimal) -> Result<Option<Decimal>, PricingError> {
        let bands = self.title_rate_repository.rate_bands(carrier_id, state, policy_type).await?;
        if bands.is_empty() {
            return Ok(None);
        }

        let mut total = dec!(0);
        let mut minimums_seen = Vec::new();
        for (coverage_min, coverage_max, rate_per_thousand, flat_fee, minimum_premium) in bands {
            if insured_amount <= coverage_min {
                break;
            }
            let band_amount = insured_amount.min(coverage_max) - coverage_min;
            total += band_amount * rate_per_thousand / dec!(1000) + flat_fee;
            minimums_seen.push(minimum_premium);
        }

        let floor = minimums_seen.into_iter().max().unwrap_or_default();
        Ok(Some(total.max(floor)))
    }

    async fn simultaneous_discount(&self, carrier_id: Uuid, state: &str, loan_amount: Decimal, lender_premium: Decimal) -> Result<Decimal, PricingError> {
        let Some((discount_rate_per_thousand, discount_pct, flat_fee)) =
            self.title_rate_repository.simultaneous_issue_band(carrier_id, state, loan_amount).await?
        else {
            return Ok(dec!(0));
        };

        let base_discount = if discount_rate_per_thousand > dec!(0) {
            loan_amount * discount_rate_per_thousand / dec!(1000)
        } else {
            lender_premium * discount_pct / dec!(100)
        };
        Ok(base_discount + flat_fee)
    }

    async fn reissue_credit(&self, carrier_id: Uuid, state: &str, years_since: Decimal, base_premium: Option<Decimal>) -> Result<Decimal, PricingError> {
        let Some(base) = base_premium else { return Ok(dec!(0)) };
        let Some(credit_pct) = self.title_rate_repository.reissue_credit_pct(carrier_id, state, years_since).await? else {
            return Ok(dec!(0));
        };
        Ok(base * credit_pct / dec!(100))
    }

    async fn endorsement_fees(&self, carrier_id: Uuid, state: &str, codes: &[String], base_premium: Decimal) -> Result<Decimal, PricingError> {
        let endorsements = self.title_rate_repository.endorsements(carrier_id, state, codes).await?;
        let mut total = dec!(0);
        for (_code, flat_fee, rate_per_thousand, pct_of_base) in endorsements {
            total += flat_fee + base_premium * rate_per_thousand / dec!(1000) + base_premium * pct_of_base;
        }
        Ok(total)
    }

    fn log_quote(&self, request: &TitleQuoteRequest, response: &TitleQuoteResponse) {
        let repo = self.quote_log_repository.clone();
        let request_json = serde_json::to_value(request).unwrap_or(json!({}));
        let summary = json!({
            "state": response.state,
            "carriers_quoted": response.carriers_quoted,
        });
        let carriers_quoted = response.carriers_quoted;
        let best_premium = response.best.as_ref().map(|q| q.total_premium);
        let best_carrier_id = response.best.as_ref().map(|q| q.carrier_id);
        let processing_time_ms = response.processing_time_ms;
        tokio::spawn(async move {
            let _ = repo.log_title_quote(request_json, summary, carriers_quoted, best_premium, best_carrier_id, processing_time_ms).await;
        });
    }
}

fn elapsed_ms(started: Instant) -> Decimal {
    Decimal::from_f64_retain(started.elapsed().as_secs_f64() * 1000.0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiered_band_walk_stops_at_first_unreached_minimum() {
        // $150k insured against bands [0,100k) and [100k,10M) should only
        // consume the first band fully and part of the second.
        let bands = vec![(dec!(0), dec!(100000), dec!(5.75), dec!(0), dec!(100)), (dec!(100000), dec!(10000000), dec!(4.00), dec!(0), dec!(0))];
        let insured = dec!(150000);
        let mut total = dec!(0);
        for (coverage_min, coverage_max, rate_per_thousand, flat_fee, _minimum) in bands {
            if insured <= coverage_min {
                break;
            }
            let band_amount = insured.min(coverage_max) - coverage_min;
            total += band_amount * rate_per_thousand / dec!(1000) + flat_fee;
        }
        assert_eq!(total, dec!(775));
    }
}
