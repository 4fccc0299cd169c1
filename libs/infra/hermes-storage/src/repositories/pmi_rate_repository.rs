// [libs/infra/hermes-storage/src/repositories/pmi_rate_repository.rs]
//! Curated PMI rate cards, grid cells, and adjustments. Reads back the
//! hand-loaded reference data `hermes-pricing` prices against; writes
//! are natural-key-superseded the same way rate filings are.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::rate_cards::{AdjustmentMethod, PmiAdjustment, PmiRateCard, PmiRateCell, PremiumType};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct PmiRateRepository {
    client: StorageClient,
}

impl PmiRateRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    /// Installs a new current rate card for (carrier, premium_type, state),
    /// superseding whichever row previously held that natural key.
    #[instrument(skip(self, cells, adjustments))]
    pub async fn install_card(
        &self,
        carrier_id: Uuid,
        state: Option<&str>,
        premium_type: PremiumType,
        source: &str,
        effective_date: DateTime<Utc>,
        cells: &[(Decimal, Decimal, i32, i32, Decimal, Decimal)],
        adjustments: &[(String, serde_json::Value, AdjustmentMethod, Decimal)],
    ) -> Result<PmiRateCard, StorageError> {
        let mut conn = self.client.connection()?;
        let tx = conn.transaction().await.map_err(|e| StorageError::Transaction(e.to_string()))?;

        let ptype_str = premium_type_str(premium_type);
        tx.execute(
            "UPDATE pmi_rate_cards SET is_current = 0 \
             WHERE carrier_id = ?1 AND premium_type = ?2 AND (state = ?3 OR (state IS NULL AND ?3 IS NULL)) \
             AND is_current = 1",
            libsql::params![carrier_id.to_string(), ptype_str, state],
        )
        .await?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO pmi_rate_cards (id, carrier_id, state, premium_type, source, effective_date, is_current) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            libsql::params![id.to_string(), carrier_id.to_string(), state, ptype_str, source, effective_date.to_rfc3339()],
        )
        .await?;

        for (ltv_min, ltv_max, fico_min, fico_max, coverage_pct, rate_pct) in cells {
            tx.execute(
                "INSERT INTO pmi_rate_cells \
                 (id, rate_card_id, ltv_min, ltv_max, fico_min, fico_max, coverage_pct, rate_pct) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                libsql::params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    ltv_min.to_string(),
                    ltv_max.to_string(),
                    *fico_min,
                    *fico_max,
                    coverage_pct.to_string(),
                    rate_pct.to_string(),
                ],
            )
            .await?;
        }

        for (name, condition, method, value) in adjustments {
            tx.execute(
                "INSERT INTO pmi_adjustments (id, rate_card_id, name, condition, method, value) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    Uuid::new_v4().to_string(),
                    id.to_string(),
                    name.as_str(),
                    condition.to_string(),
                    adjustment_method_str(*method),
                    value.to_string(),
                ],
            )
            .await?;
        }

        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))?;

        Ok(PmiRateCard {
            id,
            carrier_id,
            state: state.map(str::to_string),
            premium_type,
            source: source.to_string(),
            effective_date,
            is_current: true,
        })
    }

    /// Carriers with an active, current card for `premium_types`, optionally
    /// restricted to a state (a nationwide card also counts) and to a
    /// caller-supplied carrier allowlist.
    #[instrument(skip(self))]
    pub async fn carriers_with_current_cards(
        &self,
        state: Option<&str>,
        premium_types: &[PremiumType],
        carrier_ids: Option<&[Uuid]>,
    ) -> Result<Vec<Uuid>, StorageError> {
        let conn = self.client.connection()?;
        let mut seen = std::collections::BTreeSet::new();

        for premium_type in premium_types {
            let mut rows = conn
                .query(
                    "SELECT DISTINCT c.id FROM carriers c \
                     JOIN pmi_rate_cards rc ON rc.carrier_id = c.id \
                     WHERE c.status = 'active' AND rc.is_current = 1 AND rc.premium_type = ?1 \
                       AND (?2 IS NULL OR rc.state = ?2 OR rc.state IS NULL) \
                     ORDER BY c.id",
                    libsql::params![premium_type_str(*premium_type), state],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                seen.insert(parse_uuid(row.get::<String>(0)?)?);
            }
        }

        let mut out: Vec<Uuid> = seen.into_iter().collect();
        if let Some(ids) = carrier_ids {
            let allow: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
            out.retain(|id| allow.contains(id));
        }
        Ok(out)
    }

    /// Looks up the rate cell matching (ltv, fico, coverage) for a
    /// carrier/premium type, preferring a state-specific card over a
    /// nationwide one.
    #[instrument(skip(self))]
    pub async fn lookup_rate_cell(
        &self,
        carrier_id: Uuid,
        _state: &str,
        ltv: Decimal,
        fico: i32,
        coverage_pct: Decimal,
        premium_type: PremiumType,
    ) -> Result<Option<Decimal>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT r.rate_pct FROM pmi_rate_cells r \
                 JOIN pmi_rate_cards rc ON rc.id = r.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.premium_type = ?2 AND rc.is_current = 1 \
                   AND ?3 BETWEEN r.ltv_min AND r.ltv_max \
                   AND ?4 BETWEEN r.fico_min AND r.fico_max \
                   AND r.coverage_pct = ?5 \
                 ORDER BY CASE WHEN rc.state IS NOT NULL THEN 0 ELSE 1 END, rc.effective_date DESC \
                 LIMIT 1",
                libsql::params![
                    carrier_id.to_string(),
                    premium_type_str(premium_type),
                    ltv.to_string(),
                    fico,
                    coverage_pct.to_string(),
                ],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(
                row.get::<String>(0)?.parse().map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn adjustments_for(
        &self,
        carrier_id: Uuid,
        premium_type: PremiumType,
    ) -> Result<Vec<PmiAdjustment>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT a.id, a.rate_card_id, a.name, a.condition, a.method, a.value \
                 FROM pmi_adjustments a JOIN pmi_rate_cards rc ON rc.id = a.rate_card_id \
                 WHERE rc.carrier_id = ?1 AND rc.premium_type = ?2 AND rc.is_current = 1 \
                 ORDER BY a.name",
                libsql::params![carrier_id.to_string(), premium_type_str(premium_type)],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(PmiAdjustment {
                id: parse_uuid(row.get::<String>(0)?)?,
                rate_card_id: parse_uuid(row.get::<String>(1)?)?,
                name: row.get(2)?,
                condition: serde_json::from_str(&row.get::<String>(3)?)
                    .map_err(|e| StorageError::Mapping(e.to_string()))?,
                method: parse_adjustment_method(&row.get::<String>(4)?)?,
                value: row.get::<String>(5)?.parse().map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
            });
        }
        Ok(out)
    }

    /// Source/effective_date metadata for the current card, used to
    /// annotate quotes.
    #[instrument(skip(self))]
    pub async fn card_meta(
        &self,
        carrier_id: Uuid,
        premium_type: PremiumType,
    ) -> Result<Option<(String, DateTime<Utc>)>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT source, effective_date FROM pmi_rate_cards \
                 WHERE carrier_id = ?1 AND premium_type = ?2 AND is_current = 1 \
                 ORDER BY effective_date DESC LIMIT 1",
                libsql::params![carrier_id.to_string(), premium_type_str(premium_type)],
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
}

pub fn premium_type_str(p: PremiumType) -> &'static str {
    match p {
        PremiumType::Monthly => "monthly",
        PremiumType::Single => "single",
        PremiumType::Split => "split",
        PremiumType::LenderPaid => "lender_paid",
    }
}

fn adjustment_method_str(m: AdjustmentMethod) -> &'static str {
    match m {
        AdjustmentMethod::Additive => "additive",
        AdjustmentMethod::Multiplicative => "multiplicative",
        AdjustmentMethod::Override => "override",
    }
}

fn parse_adjustment_method(s: &str) -> Result<AdjustmentMethod, StorageError> {
    match s {
        "additive" => Ok(AdjustmentMethod::Additive),
        "multiplicative" => Ok(AdjustmentMethod::Multiplicative),
        "override" => Ok(AdjustmentMethod::Override),
        other => Err(StorageError::Mapping(format!("unknown adjustment method: {other}"))),
    }
}

fn parse_uuid(s: String) -> Result<Uuid, StorageError> {
    Uuid::parse_str(&s).map_err(|e| StorageError::Mapping(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn seed_carrier(repo: &PmiRateRepository) -> Uuid {
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
    async fn installs_card_and_looks_up_cell() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = PmiRateRepository::new(client);
        let carrier_id = seed_carrier(&repo).await;

        repo.install_card(
            carrier_id,
            None,
            PremiumType::Monthly,
            "manual",
            Utc::now(),
            &[(dec!(90.01), dec!(95.00), 680, 850, dec!(30.0), dec!(0.52))],
            &[],
        )
        .await
        .unwrap();

        let rate = repo
            .lookup_rate_cell(carrier_id, "TX", dec!(92.5), 700, dec!(30.0), PremiumType::Monthly)
            .await
            .unwrap();
        assert_eq!(rate, Some(dec!(0.52)));
    }

    #[tokio::test]
    async fn installing_a_second_card_supersedes_the_first() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = PmiRateRepository::new(client);
        let carrier_id = seed_carrier(&repo).await;

        repo.install_card(
            carrier_id,
            None,
            PremiumType::Monthly,
            "manual",
            Utc::now(),
            &[(dec!(90.01), dec!(95.00), 680, 850, dec!(30.0), dec!(0.52))],
            &[],
        )
        .await
        .unwrap();
        repo.install_card(
            carrier_id,
            None,
            PremiumType::Monthly,
            "manual",
            Utc::now(),
            &[(dec!(90.01), dec!(95.00), 680, 850, dec!(30.0), dec!(0.60))],
            &[],
        )
        .await
        .unwrap();

        let rate = repo
            .lookup_rate_cell(carrier_id, "TX", dec!(92.5), 700, dec!(30.0), PremiumType::Monthly)
            .await
            .unwrap();
        assert_eq!(rate, Some(dec!(0.60)));
    }
}
