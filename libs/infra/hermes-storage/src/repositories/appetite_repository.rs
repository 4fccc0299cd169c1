// [libs/infra/hermes-storage/src/repositories/appetite_repository.rs]
//! Appetite profiles (one row per carrier/state/line, recomputed in
//! place) and change signals (append-only).

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::{DateTime, Utc};
use hermes_models::appetite::{AppetiteProfile, ChangeSignal, SignalKind};
use hermes_models::filing::LineOfBusiness;
use hermes_models::pricing::CarrierRanking;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppetiteRepository {
    client: StorageClient,
}

impl AppetiteRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, covered_property_types, eligible_classes, ineligible_classes, preferred_classes, territory_preference))]
    pub async fn upsert_profile(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        appetite_score: Decimal,
        eligible_classes: &[String],
        ineligible_classes: &[String],
        preferred_classes: &[String],
        territory_preference: serde_json::Value,
        min_fico: Option<i32>,
        max_ltv: Option<Decimal>,
        limit_min: Option<Decimal>,
        limit_max: Option<Decimal>,
        deductible_min: Option<Decimal>,
        deductible_max: Option<Decimal>,
        premium_min: Option<Decimal>,
        premium_max: Option<Decimal>,
        rate_competitiveness_index: Decimal,
        last_rate_change_pct: Option<Decimal>,
        source_filing_count: i32,
        covered_property_types: &[String],
    ) -> Result<AppetiteProfile, StorageError> {
        let conn = self.client.connection()?;
        let line_str = line_of_business_str(line_of_business);
        let types_json = serde_json::to_string(covered_property_types).map_err(|e| StorageError::Mapping(e.to_string()))?;
        let eligible_json = serde_json::to_string(eligible_classes).map_err(|e| StorageError::Mapping(e.to_string()))?;
        let ineligible_json = serde_json::to_string(ineligible_classes).map_err(|e| StorageError::Mapping(e.to_string()))?;
        let preferred_json = serde_json::to_string(preferred_classes).map_err(|e| StorageError::Mapping(e.to_string()))?;
        let territory_json = territory_preference.to_string();

        conn.execute(
            "INSERT INTO appetite_profiles \
             (id, carrier_id, state, line_of_business, appetite_score, eligible_classes, \
              ineligible_classes, preferred_classes, territory_preference, min_fico, max_ltv, \
              limit_min, limit_max, deductible_min, deductible_max, premium_min, premium_max, \
              rate_competitiveness_index, last_rate_change_pct, source_filing_count, \
              covered_property_types, is_current, computed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
                     ?18, ?19, ?20, ?21, 1, CURRENT_TIMESTAMP) \
             ON CONFLICT(carrier_id, state, line_of_business) DO UPDATE SET \
               appetite_score = excluded.appetite_score, \
               eligible_classes = excluded.eligible_classes, \
               ineligible_classes = excluded.ineligible_classes, \
               preferred_classes = excluded.preferred_classes, \
               territory_preference = excluded.territory_preference, \
               min_fico = excluded.min_fico, \
               max_ltv = excluded.max_ltv, \
               limit_min = excluded.limit_min, \
               limit_max = excluded.limit_max, \
               deductible_min = excluded.deductible_min, \
               deductible_max = excluded.deductible_max, \
               premium_min = excluded.premium_min, \
               premium_max = excluded.premium_max, \
               rate_competitiveness_index = excluded.rate_competitiveness_index, \
               last_rate_change_pct = excluded.last_rate_change_pct, \
               source_filing_count = excluded.source_filing_count, \
               covered_property_types = excluded.covered_property_types, \
               is_current = 1, \
               computed_at = CURRENT_TIMESTAMP",
            libsql::params![
                Uuid::new_v4().to_string(),
                carrier_id.to_string(),
                state,
                line_str,
                appetite_score.to_string(),
                eligible_json,
                ineligible_json,
                preferred_json,
                territory_json,
                min_fico,
                max_ltv.map(|d| d.to_string()),
                limit_min.map(|d| d.to_string()),
                limit_max.map(|d| d.to_string()),
                deductible_min.map(|d| d.to_string()),
                deductible_max.map(|d| d.to_string()),
                premium_min.map(|d| d.to_string()),
                premium_max.map(|d| d.to_string()),
                rate_competitiveness_index.to_string(),
                last_rate_change_pct.map(|d| d.to_string()),
                source_filing_count,
                types_json,
            ],
        )
        .await?;

        Ok(AppetiteProfile {
            id: Uuid::new_v4(),
            carrier_id,
            state: state.to_string(),
            line_of_business,
            appetite_score,
            eligible_classes: eligible_classes.to_vec(),
            ineligible_classes: ineligible_classes.to_vec(),
            preferred_classes: preferred_classes.to_vec(),
            territory_preference: territory_preference.clone(),
            min_fico,
            max_ltv,
            limit_min,
            limit_max,
            deductible_min,
            deductible_max,
            premium_min,
            premium_max,
            rate_competitiveness_index,
            last_rate_change_pct,
            source_filing_count,
            covered_property_types: covered_property_types.to_vec(),
            is_current: true,
            computed_at: Utc::now(),
        })
    }

    /// The current appetite profile for a carrier/state/line, if one has
    /// been computed yet — the change detector's baseline to diff against.
    #[instrument(skip(self))]
    pub async fn profile_for(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
    ) -> Result<Option<AppetiteProfile>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, appetite_score, eligible_classes, \
                 ineligible_classes, preferred_classes, territory_preference, min_fico, max_ltv, \
                 limit_min, limit_max, deductible_min, deductible_max, premium_min, premium_max, \
                 rate_competitiveness_index, last_rate_change_pct, source_filing_count, \
                 covered_property_types, is_current, computed_at \
                 FROM appetite_profiles WHERE carrier_id = ?1 AND state = ?2 AND line_of_business = ?3",
                libsql::params![carrier_id.to_string(), state, line_of_business_str(line_of_business)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_profile_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Flips `is_current = 0` on every profile not recomputed within
    /// `max_age_days` days. Returns the number of profiles flipped.
    #[instrument(skip(self))]
    pub async fn mark_stale_profiles(&self, max_age_days: i64) -> Result<u64, StorageError> {
        let conn = self.client.connection()?;
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let affected = conn
            .execute(
                "UPDATE appetite_profiles SET is_current = 0 \
                 WHERE is_current = 1 AND computed_at < ?1",
                libsql::params![cutoff.to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }

    #[instrument(skip(self, detail))]
    pub async fn record_signal(
        &self,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        kind: SignalKind,
        strength: Decimal,
        previous_filing_id: Option<Uuid>,
        current_filing_id: Uuid,
        detail: serde_json::Value,
    ) -> Result<ChangeSignal, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO change_signals \
             (id, carrier_id, state, line_of_business, kind, strength, previous_filing_id, \
              current_filing_id, detail) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            libsql::params![
                id.to_string(),
                carrier_id.to_string(),
                state,
                line_of_business_str(line_of_business),
                signal_kind_str(kind),
                strength.to_string(),
                previous_filing_id.map(|id| id.to_string()),
                current_filing_id.to_string(),
                detail.to_string(),
            ],
        )
        .await?;

        Ok(ChangeSignal {
            id,
            carrier_id,
            state: state.to_string(),
            line_of_business,
            kind,
            strength,
            previous_filing_id,
            current_filing_id,
            detail,
            acknowledged: false,
            detected_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn recent_signals(&self, since: DateTime<Utc>) -> Result<Vec<ChangeSignal>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, kind, strength, previous_filing_id, \
                 current_filing_id, detail, acknowledged, detected_at FROM change_signals \
                 WHERE detected_at >= ?1 ORDER BY detected_at DESC",
                libsql::params![since.to_rfc3339()],
            )
            .await?;

        let mut signals = Vec::new();
        while let Some(row) = rows.next().await? {
            signals.push(map_signal_row(&row)?);
        }
        Ok(signals)
    }

    /// Unacknowledged signals across every carrier, highest strength
    /// first — the alert manager's `GetUnread` surface.
    #[instrument(skip(self))]
    pub async fn unacknowledged_signals(&self) -> Result<Vec<ChangeSignal>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, kind, strength, previous_filing_id, \
                 current_filing_id, detail, acknowledged, detected_at FROM change_signals \
                 WHERE acknowledged = 0 ORDER BY strength DESC, detected_at DESC LIMIT 500",
                libsql::params![],
            )
            .await?;

        let mut signals = Vec::new();
        while let Some(row) = rows.next().await? {
            signals.push(map_signal_row(&row)?);
        }
        Ok(signals)
    }

    /// Top 10 strongest signals for a state/line in a date window — the
    /// market report's "top_signals" feature.
    #[instrument(skip(self))]
    pub async fn top_signals_in_window(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ChangeSignal>, StorageError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, carrier_id, state, line_of_business, kind, strength, previous_filing_id, \
                 current_filing_id, detail, acknowledged, detected_at FROM change_signals \
                 WHERE state = ?1 AND line_of_business = ?2 AND detected_at BETWEEN ?3 AND ?4 \
                 ORDER BY strength DESC, detected_at DESC LIMIT 10",
                libsql::params![state, line_of_business_str(line_of_business), since.to_rfc3339(), until.to_rfc3339()],
            )
            .await?;

        let mut signals = Vec::new();
        while let Some(row) = rows.next().await? {
            signals.push(map_signal_row(&row)?);
        }
        Ok(signals)
    }

    /// Marks a single signal acknowledged. Returns `false` if no signal
    /// with that id exists.
    #[instrument(skip(self))]
    pub async fn acknowledge_signal(&self, signal_id: Uuid) -> Result<bool, StorageError> {
        let conn = self.client.connection()?;
        let affected = conn
            .execute(
                "UPDATE change_signals SET acknowledged = 1 WHERE id = ?1",
                libsql::params![signal_id.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Count of unacknowledged signals at or above `min_strength` —
    /// feeds the `health_check` task's severity gate.
    #[instrument(skip(self))]
    pub async fn unacknowledged_signal_count_at_least(&self, min_strength: Decimal) -> Result<u64, StorageError> {
        use rust_decimal::prelude::ToPrimitive;
        let conn = self.client.connection()?;
        let threshold = min_strength.to_f64().unwrap_or(0.0);
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM change_signals WHERE acknowledged = 0 AND CAST(strength AS REAL) >= ?1",
                libsql::params![threshold],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Upserts one carrier's ranking for a (state, line, class_code),
    /// computing its rank as one plus the count of carriers already
    /// ranked there with a lower (better) premium index.
    #[instrument(skip(self))]
    pub async fn upsert_ranking(
        &self,
        state: &str,
        line_of_business: LineOfBusiness,
        class_code: &str,
        carrier_id: Uuid,
        estimated_premium_index: Option<Decimal>,
    ) -> Result<CarrierRanking, StorageError> {
        let conn = self.client.connection()?;
        let line_str = line_of_business_str(line_of_business);

        let rank = match estimated_premium_index {
            Some(index) => {
                let mut rows = conn
                    .query(
                        "SELECT COUNT(*) FROM carrier_rankings \
                         WHERE state = ?1 AND line_of_business = ?2 AND class_code = ?3 \
                         AND CAST(estimated_premium_index AS REAL) < ?4",
                        libsql::params![state, line_str, class_code, index.to_string().parse::<f64>().unwrap_or(0.0)],
                    )
                    .await?;
                match rows.next().await? {
                    Some(row) => row.get::<i64>(0)? as i32 + 1,
                    None => 1,
                }
            }
            None => 1,
        };

        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO carrier_rankings \
             (id, state, line_of_business, class_code, carrier_id, rank, estimated_premium_index, computed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP) \
             ON CONFLICT(state, line_of_business, class_code, carrier_id) DO UPDATE SET \
               rank = excluded.rank, \
               estimated_premium_index = excluded.estimated_premium_index, \
               computed_at = CURRENT_TIMESTAMP",
            libsql::params![
                id.to_string(),
                state,
                line_str,
                class_code,
                carrier_id.to_string(),
                rank,
                estimated_premium_index.map(|d| d.to_string()),
            ],
        )
        .await?;

        Ok(CarrierRanking {
            id,
            state: state.to_string(),
            line_of_business,
            class_code: class_code.to_string(),
            carrier_id,
            rank,
            estimated_premium_index,
            computed_at: Utc::now(),
        })
    }
}

fn map_profile_row(row: &libsql::Row) -> Result<AppetiteProfile, StorageError> {
    let line_str: String = row.get(3)?;
    Ok(AppetiteProfile {
        id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        carrier_id: Uuid::parse_str(&row.get::<String>(1)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        state: row.get(2)?,
        line_of_business: match line_str.as_str() {
            "pmi" => LineOfBusiness::Pmi,
            "title" => LineOfBusiness::Title,
            other => return Err(StorageError::Mapping(format!("unknown line_of_business: {other}"))),
        },
        appetite_score: row
            .get::<String>(4)?
            .parse()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        eligible_classes: serde_json::from_str(&row.get::<String>(5)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        ineligible_classes: serde_json::from_str(&row.get::<String>(6)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        preferred_classes: serde_json::from_str(&row.get::<String>(7)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        territory_preference: serde_json::from_str(&row.get::<String>(8)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        min_fico: row.get::<Option<i64>>(9)?.map(|v| v as i32),
        max_ltv: row
            .get::<Option<String>>(10)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        limit_min: row
            .get::<Option<String>>(11)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        limit_max: row
            .get::<Option<String>>(12)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        deductible_min: row
            .get::<Option<String>>(13)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        deductible_max: row
            .get::<Option<String>>(14)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        premium_min: row
            .get::<Option<String>>(15)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        premium_max: row
            .get::<Option<String>>(16)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        rate_competitiveness_index: row
            .get::<String>(17)?
            .parse()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        last_rate_change_pct: row
            .get::<Option<String>>(18)?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        source_filing_count: row.get::<i64>(19)? as i32,
        covered_property_types: serde_json::from_str(&row.get::<String>(20)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        is_current: row.get::<i64>(21)? != 0,
        computed_at: DateTime::parse_from_rfc3339(&row.get::<String>(22)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
    })
}

fn line_of_business_str(l: LineOfBusiness) -> &'static str {
    match l {
        LineOfBusiness::Pmi => "pmi",
        LineOfBusiness::Title => "title",
    }
}

fn signal_kind_str(k: SignalKind) -> &'static str {
    match k {
        SignalKind::RateDecrease => "rate_decrease",
        SignalKind::RateIncrease => "rate_increase",
        SignalKind::ExpandedClasses => "expanded_classes",
        SignalKind::ContractedClasses => "contracted_classes",
        SignalKind::NewStateEntry => "new_state_entry",
        SignalKind::FilingWithdrawal => "filing_withdrawal",
        SignalKind::TerritoryExpansion => "territory_expansion",
    }
}

fn map_signal_row(row: &libsql::Row) -> Result<ChangeSignal, StorageError> {
    let line_str: String = row.get(3)?;
    let kind_str: String = row.get(4)?;
    let kind = match kind_str.as_str() {
        "rate_decrease" => SignalKind::RateDecrease,
        "rate_increase" => SignalKind::RateIncrease,
        "expanded_classes" => SignalKind::ExpandedClasses,
        "contracted_classes" => SignalKind::ContractedClasses,
        "new_state_entry" => SignalKind::NewStateEntry,
        "filing_withdrawal" => SignalKind::FilingWithdrawal,
        "territory_expansion" => SignalKind::TerritoryExpansion,
        other => return Err(StorageError::Mapping(format!("unknown signal kind: {other}"))),
    };

    Ok(ChangeSignal {
        id: Uuid::parse_str(&row.get::<String>(0)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        carrier_id: Uuid::parse_str(&row.get::<String>(1)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        state: row.get(2)?,
        line_of_business: match line_str.as_str() {
            "pmi" => LineOfBusiness::Pmi,
            "title" => LineOfBusiness::Title,
            other => return Err(StorageError::Mapping(format!("unknown line_of_business: {other}"))),
        },
        kind,
        strength: row
            .get::<String>(5)?
            .parse()
            .map_err(|e: rust_decimal::Error| StorageError::Mapping(e.to_string()))?,
        previous_filing_id: row
            .get::<Option<String>>(6)?
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        current_filing_id: Uuid::parse_str(&row.get::<String>(7)?)
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
        detail: serde_json::from_str(&row.get::<String>(8)?).map_err(|e| StorageError::Mapping(e.to_string()))?,
        acknowledged: row.get::<i64>(9)? != 0,
        detected_at: DateTime::parse_from_rfc3339(&row.get::<String>(10)?)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| StorageError::Mapping(e.to_string()))?,
    })
}
