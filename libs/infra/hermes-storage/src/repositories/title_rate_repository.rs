// [libs/infra/hermes-storage/src/repositories/title_rate_repository.rs]
//! Curated Title rate cards, coverage bands, simultaneous-issue
//! discount bands, reissue credit tiers, and endorsement fee schedules.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::rate_cards::{PolicyType, TitleRateCard};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct TitleRateRepository {
    client: StorageClient,
}

impl TitleRateRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, bands))]
    pub async fn install_rate_card(
        &self,
        carrier_id: Uuid,
        state: &str,
        policy_type: PolicyType,
        source: &str,
        effective_date: DateTime<Utc>,
        is_promulgated: bool,
        bands: &[(Decimal, Decimal, Decimal, Decimal, Decimal)],
    ) -> Result<TitleRateCard, StorageError> {
        let mut conn = self.client.connection()?;
        let tx = conn.transaction().await.map_err(|e| StorageError::Transaction(e.to_string()))?;

        let ptype_str = policy_type_str(policy_type);
        tx.execute(
            "UPDATE title_rate_cards SET is_current = 0 \
             WHERE carrier_id = ?1 AND state = ?2 AND policy_type = ?3 AND is_current = 1",
            libsql::params![carrier_id.to_string(), state, ptype_str],
        )
        .await?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO title_rate_cards \
             (id, carrier_id, state, policy_type, source, effective_date, is_current, is_promulgated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            libsql::params![
                id.to_string(),
                carrier_id.to_string(),
                state,
                ptype_str,
                source,
                effective_date.to_rfc3339(),
                is_promulgated,
            ],
        )
        .await?;

        for (coverage_min, coverage_max, rate_per_thousand, flat_fee, minimum_premium) in bands {
            tx.execute(
                "INSERT INTO title_rate_bands \
                 (id, rate_card_id, coverage_min, coverage_max, rate_per_thousand, flat_fee, minimum_premium) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    coverage_min.to_string(),
                    coverage_max.to_string(),
                    rate_per_thousand.to_string(),
                    flat_fee.to_string(),
                    minimum_premium.to_string(),
                ],
            )
            .await?;
        }

        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(TitleRateCard {
            id,
            carrier_id,
            state: state.to_string(),
            policy_type,
            source: source.to_string(),
            effective_date,
            is_current: true,
            is_promulgated,
        })
    }

    #[instrument(skip(self))]
    pub async fn install_simultaneous_issue_band(
        &self,
        rate_card_id: Uuid,
        loan_min: Decimal,
        loan_max: Decimal,
        discount_rate_per_thousand: Decimal,
        discount_pct: Decimal,
        flat_fee: Decimal,
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO title_simultaneous_issue \
             (id, rate_card_id, loan_min, loan_max, discount_rate_per_thousand, discount_pct, flat_fee) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            libsql::params![
                Uuid::new_v4().to_string(),
                rate_card_id.to_string(),
                loan_min.to_string(),
                loan_max.to_string(),
                discount_rate_per_thousand.to_string(),
                discount_pct.to_string(),
                flat_fee.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn install_reissue_credit_tier(
        &self,
        rate_card_id: Uuid,
        years_since_min: Decimal,
        years_since_max: Decimal,
        credit_pct: Decimal,
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO title_reissue_credits (id, rate_card_id, years_since_min, years_since_max, credit_pct) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                Uuid::new_v4().to_string(),
                rate_card_id.to_string(),
                years_since_min.to_string(),
                years_since_max.to_string(),
                credit_pct.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn install_endorsement(
        &self,
        rate_card_id: Uuid,
        endorsement_code: &str,
        flat_fee: Decimal,
        rate_per_thousand: Decimal,
        pct_of_base: Decimal,
    ) -> Result<(), StorageError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO title_endorsements (id, rate_card_id, endorsement_code, flat_fee, rate_per_thousand, pct_of_base) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            libsql::params![
                Uuid::new_v4().to_string(),
                rate_card_id.to_string(),
                endorsement_code,
                flat_fee.to_string(),
                rate_per_thousand.to_string(),
                pct_of_base.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    /// Active carriers with a current card in `state`, plus whether any of
    /// their current cards for that state are promulgated.
    #[instrument(skip(self))]
    pub async fn carriers_with_current_cards(
        &self,
        state: &str,
        carrier_ids: Option<&[Uuid]>,
    ) -> Result<Vec<(Uuid, bool)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT c.id, MAX(rc.is_promulgated) FROM carriers c \
                 JOIN title_rate_cards rc ON rc.carrier_id = c.id \
                 WHERE c.status = 'active' AND rc.is_current = 1 AND rc.state = ?1 \
                 GROUP BY c.id ORDER BY c.id",
                libsql::params![state],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((parse_uuid(row.get::<String>(0)?)?, row.get::<i64>(1)? != 0));
        }

        if let Some(ids) = carrier_ids {
            let allow: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
            out.retain(|(id, _)| allow.contains(id));
        }
        Ok(out)
    }

    /// The ordered coverage bands for a carrier/state/policy_type, used to
    /// walk the tiered premium computation.
    #[instrument(skip(self))]
    pub async fn rate_bands(
        &self,
        carrier_id: Uuid,
        state: &str,
        policy_type: PolicyType,
    ) -> Result<Vec<(Decimal, Decimal, Decimal, Decimal, Decimal)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT r.coverage_min, r.coverage_max, r.rate_per_thousand, r.flat_fee, r.minimum_premium \
                 FROM title_rate_bands r JOIN title_rate_cards rc ON rc.id = r.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.state = ?2 AND rc.policy_type = ?3 AND rc.is_current = 1 \
                 ORDER BY r.coverage_min ASC",
                libsql::params![carrier_id.to_string(), state, policy_type_str(policy_type)],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((
                parse_decimal(row.get::<String>(0)?)?,
                parse_decimal(row.get::<String>(1)?)?,
                parse_decimal(row.get::<String>(2)?)?,
                parse_decimal(row.get::<String>(3)?)?,
                parse_decimal(row.get::<String>(4)?)?,
            ));
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn simultaneous_issue_band(
        &self,
        carrier_id: Uuid,
        state: &str,
        loan_amount: Decimal,
    ) -> Result<Option<(Decimal, Decimal, Decimal)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT si.discount_rate_per_thousand, si.discount_pct, si.flat_fee \
                 FROM title_simultaneous_issue si JOIN title_rate_cards rc ON rc.id = si.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.state = ?2 AND rc.is_current = 1 \
                   AND ?3 BETWEEN si.loan_min AND si.loan_max \
                 ORDER BY si.loan_min ASC LIMIT 1",
                libsql::params![carrier_id.to_string(), state, loan_amount.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some((
                parse_decimal(row.get::<String>(0)?)?,
                parse_decimal(row.get::<String>(1)?)?,
                parse_decimal(row.get::<String>(2)?)?,
            ))),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn reissue_credit_pct(
        &self,
        carrier_id: Uuid,
        state: &str,
        years_since: Decimal,
    ) -> Result<Option<Decimal>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT rc2.credit_pct FROM title_reissue_credits rc2 \
                 JOIN title_rate_cards rc ON rc.id = rc2.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.state = ?2 AND rc.is_current = 1 \
                   AND ?3 BETWEEN rc2.years_since_min AND rc2.years_since_max \
                 ORDER BY rc2.credit_pct DESC LIMIT 1",
                libsql::params![carrier_id.to_string(), state, years_since.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_decimal(row.get::<String>(0)?)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, codes))]
    pub async fn endorsements(
        &self,
        carrier_id: Uuid,
        state: &str,
        codes: &[String],
    ) -> Result<Vec<(String, Decimal, Decimal, Decimal)>, StorageError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT e.endorsement_code, e.flat_fee, e.rate_per_thousand, e.pct_of_base \
                 FROM title_endorsements e JOIN title_rate_cards rc ON rc.id = e.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.state = ?2 AND rc.is_current = 1",
                libsql::params![carrier_id.to_string(), state],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let code: String = row.get(0)?;
            if !codes.iter().any(|c| c == &code) {
                continue;
            }
            out.push((
                code,
                parse_decimal(row.get::<String>(1)?)?,
                parse_decimal(row.get::<String>(2)?)?,
                parse_decimal(row.get::<String>(3)?)?,
            ));
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn card_meta(
        &self,
        carrier_id: Uuid,
        state: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT source, effective_date FROM title_rate_cards \
                 WHERE carrier_id = ?1 AND state = ?2 AND is_current = 1 \
                 ORDER BY effective_date DESC LIMIT 1",
                libsql::params![carrier_id.to_string(), state],
            )
            .await?;
        match rows.next().await? {
            Some(row) => {
                let eff = DateTime::parse_from_rfc3339(&row.get::<String>(1)?)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| StorageError::Mapping(e.to_string()))?;
                Ok(Some((row.get(0)?, eff)))
            }
            None => Ok(None),
        }
    }

    /// Resolves the rate-card id currently backing the owner (or, absent
    /// that, lender) card for a carrier/state — used to attach child rows
    /// (simultaneous-issue bands, reissue tiers, endorsements) after
    /// `install_rate_card`.
    #[instrument(skip(self))]
    pub async fn current_card_id(
        &self,
        carrier_id: Uuid,
        state: &str,
        policy_type: PolicyType,
    ) -> Result<Option<Uuid>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id FROM title_rate_cards \
                 WHERE carrier_id = ?1 AND state = ?2 AND policy_type = ?3 AND is_current = 1 \
                 ORDER BY effective_date DESC LIMIT 1",
                libsql::params![carrier_id.to_string(), state, policy_type_str(policy_type)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_uuid(row.get::<String>(0)?)?)),
            None => Ok(None),
        }
    }
}

pub fn policy_type_str(p: PolicyType) -> &'static str {
    match p {
        PolicyType::Owner => "owner",
        PolicyType::Lender => "lender",
        PolicyType::Simultaneous => "simultaneous",
    }
}

fn parse_uuid(s: String) -> Result<Uuid, StorageError> {
    Uuid::parse_str(&s).map_err(|e| StorageError::Mapping(e.to_string()))
}

fn parse_decimal(s: String) -> Result<Decimal, StorageError> {
    s.parse().map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn seed_carrier(repo: &TitleRateRepository) -> Uuid {
        let conn = repo.client.connection().unwrap();
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO carriers (id, naic_code, name) VALUES (?1, 'X', 'X')",
            libsql::params![id.to_string()],
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn tiered_bands_round_trip_in_coverage_order() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = TitleRateRepository::new(client);
        let carrier_id = seed_carrier(&repo).await;

        repo.install_rate_card(
            carrier_id,
            "TX",
            PolicyType::Owner,
            "manual",
            Utc::now(),
            true,
            &[
                (dec!(0), dec!(100000), dec!(5.75), dec!(0), dec!(100)),
                (dec!(100000), dec!(10000000), dec!(4.00), dec!(0), dec!(0)),
            ],
        )
        .await
        .unwrap();

        let bands = repo.rate_bands(carrier_id, "TX", PolicyType::Owner).await.unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].2, dec!(5.75));
    }

    #[tokio::test]
    async fn second_install_supersedes_first_card() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = TitleRateRepository::new(client);
        let carrier_id = seed_carrier(&repo).await;

        repo.install_rate_card(
            carrier_id,
            "TX",
            PolicyType::Owner,
            "manual",
            Utc::now(),
            true,
            &[(dec!(0), dec!(100000), dec!(5.75), dec!(0), dec!(100))],
        )
        .await
        .unwrap();
        repo.install_rate_card(
            carrier_id,
            "TX",
            PolicyType::Owner,
            "manual",
            Utc::now(),
            true,
            &[(dec!(0), dec!(100000), dec!(6.00), dec!(0), dec!(100))],
        )
        .await
        .unwrap();

        let bands = repo.rate_bands(carrier_id, "TX", PolicyType::Owner).await.unwrap();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].2, dec!(6.00));
    }
}
