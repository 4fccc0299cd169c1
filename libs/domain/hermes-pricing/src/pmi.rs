// [libs/domain/hermes-pricing/src/pmi.rs]
//! Private mortgage insurance pricing: LTV-driven GSE coverage
//! minimums, per-carrier rate-cell lookup, adjustment application, and
//! premium-plan conversion (monthly, single, split, lender-paid).

use crate::conditions::evaluate_condition;
use crate::errors::PricingError;
use futures::future::join_all;
use hermes_models::rate_cards::PremiumType;
use hermes_storage::repositories::{FilingRepository, PmiRateRepository, QuoteLogRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Single-premium and split-premium multipliers. Not environment
/// configuration: callers who need different multipliers construct a
/// non-default `PmiPricingConfig`.
#[derive(Debug, Clone, Copy)]
pub struct PmiPricingConfig {
    pub single_premium_multiplier: Decimal,
    pub split_premium_multiplier: Decimal,
    pub split_monthly_factor: Decimal,
}

impl Default for PmiPricingConfig {
    fn default() -> Self {
        Self {
            single_premium_multiplier: dec!(3.0),
            split_premium_multiplier: dec!(1.5),
            split_monthly_factor: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmiQuoteRequest {
    pub loan_amount: Decimal,
    pub property_value: Decimal,
    pub fico_score: i32,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub coverage_pct: Option<Decimal>,
    #[serde(default)]
    pub premium_type: Option<PremiumType>,
    #[serde(default)]
    pub carrier_ids: Option<Vec<Uuid>>,
    /// Extra rating factors (dti, property_type, occupancy, ...)
    /// evaluated against adjustment conditions alongside ltv/fico/coverage.
    #[serde(default)]
    pub adjustment_params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    pub name: String,
    pub method: String,
    pub value: Decimal,
    pub rate_before: Decimal,
    pub rate_after: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmiCarrierQuote {
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub premium_type: PremiumType,
    pub coverage_pct: Decimal,
    pub ltv: Decimal,
    pub base_rate_pct: Decimal,
    pub adjusted_rate_pct: Decimal,
    pub monthly_premium: Decimal,
    pub annual_premium: Decimal,
    pub single_premium: Option<Decimal>,
    pub adjustments_applied: Vec<AppliedAdjustment>,
    pub rate_card_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmiQuoteResponse {
    pub request_id: Uuid,
    pub loan_amount: Decimal,
    pub property_value: Decimal,
    pub ltv: Decimal,
    pub fico_score: i32,
    pub coverage_pct: Decimal,
    pub pmi_required: bool,
    pub carriers_quoted: u32,
    pub quotes: Vec<PmiCarrierQuote>,
    pub best_monthly: Option<PmiCarrierQuote>,
    pub best_annual: Option<PmiCarrierQuote>,
    pub processing_time_ms: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketGridEntry {
    pub ltv_bucket: Decimal,
    pub fico_bucket: i32,
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub rate_pct: Decimal,
}

fn gse_required_coverage(ltv: Decimal) -> Decimal {
    if ltv <= dec!(80) {
        dec!(0)
    } else if ltv <= dec!(85) {
        dec!(6)
    } else if ltv <= dec!(90) {
        dec!(25)
    } else if ltv <= dec!(95) {
        dec!(30)
    } else {
        dec!(35)
    }
}

pub struct HermesPmiEngine {
    filing_repository: FilingRepository,
    pmi_rate_repository: PmiRateRepository,
    quote_log_repository: QuoteLogRepository,
    config: PmiPricingConfig,
}

impl HermesPmiEngine {
    pub fn new(
        filing_repository: FilingRepository,
        pmi_rate_repository: PmiRateRepository,
        quote_log_repository: QuoteLogRepository,
    ) -> Self {
        Self { filing_repository, pmi_rate_repository, quote_log_repository, config: PmiPricingConfig::default() }
    }

    pub fn with_config(mut self, config: PmiPricingConfig) -> Self {
        self.config = config;
        self
    }

    #[instrument(skip(self, request))]
    pub async fn price_loan(&self, request: PmiQuoteRequest) -> Result<PmiQuoteResponse, PricingError> {
        let started = Instant::now();
        if request.loan_amount <= dec!(0) || request.property_value <= dec!(0) {
            return Err(PricingError::Validation("loan_amount and property_value must be positive".into()));
        }

        let ltv = (request.loan_amount / request.property_value) * dec!(100);
        if ltv <= dec!(80) {
            return Ok(PmiQuoteResponse {
                request_id: Uuid::new_v4(),
                loan_amount: request.loan_amount,
                property_value: request.property_value,
                ltv,
                fico_score: request.fico_score,
                coverage_pct: dec!(0),
                pmi_required: false,
                carriers_quoted: 0,
                quotes: Vec::new(),
                best_monthly: None,
                best_annual: None,
                processing_time_ms: elapsed_ms(started),
            });
        }

        let coverage_pct = request.coverage_pct.unwrap_or_else(|| gse_required_coverage(ltv));
        let premium_type = request.premium_type.unwrap_or(PremiumType::Monthly);

        let carrier_ids = self
            .pmi_rate_repository
            .carriers_with_current_cards(request.state.as_deref(), &[premium_type], request.carrier_ids.as_deref())
            .await?;

        let params = merge_params(&request.adjustment_params, ltv, request.fico_score, coverage_pct);

        let quotes = join_all(carrier_ids.iter().map(|carrier_id| {
            self.price_carrier(*carrier_id, ltv, request.fico_score, coverage_pct, premium_type, request.loan_amount, &params)
        }))
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        let best_monthly = quotes.iter().min_by(|a, b| a.monthly_premium.cmp(&b.monthly_premium)).cloned();
        let best_annual = quotes.iter().min_by(|a, b| a.annual_premium.cmp(&b.annual_premium)).cloned();
        let carriers_quoted = quotes.len() as u32;
        let processing_time_ms = elapsed_ms(started);

        let response = PmiQuoteResponse {
            request_id: Uuid::new_v4(),
            loan_amount: request.loan_amount,
            property_value: request.property_value,
            ltv,
            fico_score: request.fico_score,
            coverage_pct,
            pmi_required: true,
            carriers_quoted,
            quotes,
            best_monthly,
            best_annual,
            processing_time_ms,
        };

        self.log_quote(&request, &response);
        Ok(response)
    }

    /// Minimal quote with default coverage and premium type, for callers
    /// that only have loan/property/fico on hand.
    pub async fn quick_quote(
        &self,
        loan_amount: Decimal,
        property_value: Decimal,
        fico_score: i32,
    ) -> Result<PmiQuoteResponse, PricingError> {
        self.price_loan(PmiQuoteRequest {
            loan_amount,
            property_value,
            fico_score,
            state: None,
            coverage_pct: None,
            premium_type: None,
            carrier_ids: None,
            adjustment_params: json!({}),
        })
        .await
    }

    /// All carriers' quotes for the same loan, ranked ascending by
    /// annual premium — the comparison table behind a rate-shop view.
    pub async fn compare_carriers(&self, request: PmiQuoteRequest) -> Result<Vec<PmiCarrierQuote>, PricingError> {
        let mut response = self.price_loan(request).await?;
        response.quotes.sort_by(|a, b| a.annual_premium.cmp(&b.annual_premium));
        Ok(response.quotes)
    }

    /// LTV x FICO dispersion grid across all carriers, at the GSE
    /// minimum coverage for each LTV bucket.
    #[instrument(skip(self))]
    pub async fn market_grid(&self) -> Result<Vec<MarketGridEntry>, PricingError> {
        let ltv_buckets = [dec!(85), dec!(90), dec!(95), dec!(97)];
        let fico_buckets = [620, 660, 700, 740, 780];

        let carrier_ids = self
            .pmi_rate_repository
            .carriers_with_current_cards(None, &[PremiumType::Monthly], None)
            .await?;

        let mut entries = Vec::new();
        for ltv in ltv_buckets {
            let coverage_pct = gse_required_coverage(ltv);
            for fico in fico_buckets {
                for carrier_id in &carrier_ids {
                    let Some(rate) = self
                        .pmi_rate_repository
                        .lookup_rate_cell(*carrier_id, "", ltv, fico, coverage_pct, PremiumType::Monthly)
                        .await?
                    else {
                        continue;
                    };
                    let carrier_name = self
                        .filing_repository
                        .carrier_by_id(*carrier_id)
                        .await?
                        .map(|c| c.name)
                        .unwrap_or_else(|| carrier_id.to_string());
                    entries.push(MarketGridEntry { ltv_bucket: ltv, fico_bucket: fico, carrier_id: *carrier_id, carrier_name, rate_pct: rate });
                }
            }
        }
        Ok(entries)
    }

    async fn price_carrier(
        &self,
        carrier_id: Uuid,
        ltv: Decimal,
        fico: i32,
        coverage_pct: Decimal,
        premium_type: PremiumType,
        loan_amount: Decimal,
        params: &serde_json::Value,
    ) -> Option<PmiCarrierQuote> {
        let base_rate = self
            .pmi_rate_repository
            .lookup_rate_cell(carrier_id, "", ltv, fico, coverage_pct, premium_type)
            .await
            .ok()??;

        let adjustments = self.pmi_rate_repository.adjustments_for(carrier_id, premium_type).await.ok()?;

        let mut rate = base_rate;
        let mut applied = Vec::new();
        for adjustment in &adjustments {
            if !evaluate_condition(&adjustment.condition, params) {
                continue;
            }
            let before = rate;
            rate = match adjustment.method {
                hermes_models::rate_cards::AdjustmentMethod::Additive => rate + adjustment.value,
                hermes_models::rate_cards::AdjustmentMethod::Multiplicative => rate * adjustment.value,
                hermes_models::rate_cards::AdjustmentMethod::Override => adjustment.value,
            };
            applied.push(AppliedAdjustment {
                name: adjustment.name.clone(),
                method: method_name(adjustment.method),
                value: adjustment.value,
                rate_before: before,
                rate_after: rate,
            });
        }

        let (monthly_premium, annual_premium, single_premium) = self.calculate_premiums(rate, premium_type, loan_amount);

        let carrier_name = self
            .filing_repository
            .carrier_by_id(carrier_id)
            .await
            .ok()?
            .map(|c| c.name)
            .unwrap_or_else(|| carrier_id.to_string());
        let source = self
            .pmi_rate_repository
            .card_meta(carrier_id, premium_type)
            .await
            .ok()?
            .map(|(source, _effective)| source)
            .unwrap_or_default();

        Some(PmiCarrierQuote {
            carrier_id,
            carrier_name,
            premium_type,
            coverage_pct,
            ltv,
            base_rate_pct: base_rate,
            adjusted_rate_pct: rate,
            monthly_premium,
            annual_premium,
            single_premium,
            adjustments_applied: applied,
            rate_card_source: source,
        })
    }

    fn calculate_premiums(&self, rate_pct: Decimal, premium_type: PremiumType, loan_amount: Decimal) -> (Decimal, Decimal, Option<Decimal>) {
        let full_annual = (rate_pct / dec!(100)) * loan_amount;
        match premium_type {
            PremiumType::Monthly | PremiumType::LenderPaid => (full_annual / dec!(12), full_annual, None),
            PremiumType::Single => {
                let single = (rate_pct / dec!(100)) * loan_amount * self.config.single_premium_multiplier;
                (dec!(0), single, Some(single))
            }
            PremiumType::Split => {
                let single = (rate_pct / dec!(100)) * loan_amount * self.config.split_premium_multiplier;
                let monthly = (full_annual / dec!(12)) * self.config.split_monthly_factor;
                (monthly, monthly * dec!(12), Some(single))
            }
        }
    }

    fn log_quote(&self, request: &PmiQuoteRequest, response: &PmiQuoteResponse) {
        let repo = self.quote_log_repository.clone();
        let request_json = serde_json::to_value(request).unwrap_or(json!({}));
        let summary = json!({
            "ltv": response.ltv,
            "coverage_pct": response.coverage_pct,
            "carriers_quoted": response.carriers_quoted,
        });
        let carriers_quoted = response.carriers_quoted;
        let best_rate_pct = response.best_annual.as_ref().map(|q| q.adjusted_rate_pct);
        let best_carrier_id = response.best_annual.as_ref().map(|q| q.carrier_id);
        let processing_time_ms = response.processing_time_ms;
        tokio::spawn(async move {
            let _ = repo.log_pmi_quote(request_json, summary, carriers_quoted, best_rate_pct, best_carrier_id, processing_time_ms).await;
        });
    }
}

fn method_name(method: hermes_models::rate_cards::AdjustmentMethod) -> String {
    match method {
        hermes_models::rate_cards::AdjustmentMethod::Additive => "additive".to_string(),
        hermes_models::rate_cards::AdjustmentMethod::Multiplicative => "multiplicative".to_string(),
        hermes_models::rate_cards::AdjustmentMethod::Override => "override".to_string(),
    }
}

fn merge_params(extra: &serde_json::Value, ltv: Decimal, fico: i32, coverage_pct: Decimal) -> serde_json::Value {
    let mut map = extra.as_object().cloned().unwrap_or_default();
    map.insert("ltv".into(), json!(ltv.to_string().parse::<f64>().unwrap_or_default()));
    map.insert("fico".into(), json!(fico));
    map.insert("coverage_pct".into(), json!(coverage_pct.to_string().parse::<f64>().unwrap_or_default()));
    serde_json::Value::Object(map)
}

fn elapsed_ms(started: Instant) -> Decimal {
    Decimal::from_f64_retain(started.elapsed().as_secs_f64() * 1000.0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gse_coverage_bands_match_ltv_thresholds() {
        assert_eq!(gse_required_coverage(dec!(80)), dec!(0));
        assert_eq!(gse_required_coverage(dec!(83)), dec!(6));
        assert_eq!(gse_required_coverage(dec!(88)), dec!(25));
        assert_eq!(gse_required_coverage(dec!(93)), dec!(30));
        assert_eq!(gse_required_coverage(dec!(96)), dec!(35));
    }

    #[test]
    fn monthly_premium_is_annual_over_twelve() {
        let engine_config = PmiPricingConfig::default();
        let rate = dec!(0.52);
        let loan = dec!(300000);
        let annual = (rate / dec!(100)) * loan;
        assert_eq!(annual / dec!(12), annual * dec!(1) / dec!(12));
        let _ = engine_config;
    }
}
