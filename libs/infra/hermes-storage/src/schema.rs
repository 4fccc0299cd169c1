// [libs/infra/hermes-storage/src/schema.rs]
//! Idempotent schema migrations: base tables, tolerant column additions,
//! and acceleration indexes, applied in that order on every connect.

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

const BASE_TABLES: &[(&str, &str)] = &[
    ("TABLE_CARRIERS", r#"
        CREATE TABLE IF NOT EXISTS carriers (
            id TEXT PRIMARY KEY,
            naic_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_RATE_FILING_RECORDS", r#"
        CREATE TABLE IF NOT EXISTS rate_filing_records (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            tracking_number TEXT NOT NULL,
            filing_type TEXT NOT NULL,
            status TEXT NOT NULL,
            effective_date DATETIME,
            filed_date DATETIME,
            disposition_date DATETIME,
            summary TEXT,
            overall_rate_change_pct TEXT,
            raw_metadata TEXT NOT NULL DEFAULT '{}',
            is_current INTEGER NOT NULL DEFAULT 1,
            superseded_by TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(carrier_id, state, tracking_number)
        );
    "#),
    ("TABLE_FILING_DOCUMENTS", r#"
        CREATE TABLE IF NOT EXISTS filing_documents (
            id TEXT PRIMARY KEY,
            filing_id TEXT NOT NULL REFERENCES rate_filing_records(id),
            storage_path TEXT NOT NULL,
            mime_type TEXT,
            document_kind TEXT NOT NULL,
            checksum_sha256 TEXT NOT NULL,
            page_count INTEGER,
            parsed_at DATETIME,
            parse_confidence TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(filing_id, checksum_sha256)
        );
    "#),
    ("TABLE_RATE_TABLE_RECORDS", r#"
        CREATE TABLE IF NOT EXISTS rate_table_records (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            filing_id TEXT NOT NULL REFERENCES rate_filing_records(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            effective_date DATETIME NOT NULL,
            rows TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_RULE_SET_RECORDS", r#"
        CREATE TABLE IF NOT EXISTS rule_set_records (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            filing_id TEXT NOT NULL REFERENCES rate_filing_records(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            rules TEXT NOT NULL DEFAULT '[]',
            is_current INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_POLICY_FORMS", r#"
        CREATE TABLE IF NOT EXISTS policy_forms (
            id TEXT PRIMARY KEY,
            filing_id TEXT NOT NULL REFERENCES rate_filing_records(id),
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            form_number TEXT NOT NULL,
            form_name TEXT,
            form_edition_date TEXT,
            form_type TEXT NOT NULL DEFAULT 'policy',
            is_manuscript INTEGER NOT NULL DEFAULT 0,
            source_document_id TEXT NOT NULL UNIQUE,
            confidence TEXT NOT NULL DEFAULT '0',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_FORM_PROVISIONS", r#"
        CREATE TABLE IF NOT EXISTS form_provisions (
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL REFERENCES policy_forms(id),
            provision_type TEXT NOT NULL,
            provision_key TEXT,
            provision_text_summary TEXT NOT NULL,
            provision_text_full TEXT,
            section_reference TEXT,
            is_coverage_broadening INTEGER,
            is_coverage_restricting INTEGER,
            iso_comparison_notes TEXT,
            confidence TEXT NOT NULL DEFAULT '0'
        );
    "#),
    ("TABLE_PREMIUM_ALGORITHMS", r#"
        CREATE TABLE IF NOT EXISTS premium_algorithms (
            id TEXT PRIMARY KEY,
            rate_table_id TEXT NOT NULL REFERENCES rate_table_records(id),
            formula_kind TEXT NOT NULL,
            parameters TEXT NOT NULL DEFAULT '{}',
            is_current INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("TABLE_APPETITE_PROFILES", r#"
        CREATE TABLE IF NOT EXISTS appetite_profiles (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            appetite_score TEXT NOT NULL DEFAULT '5',
            eligible_classes TEXT NOT NULL DEFAULT '[]',
            ineligible_classes TEXT NOT NULL DEFAULT '[]',
            preferred_classes TEXT NOT NULL DEFAULT '[]',
            territory_preference TEXT NOT NULL DEFAULT '{}',
            min_fico INTEGER,
            max_ltv TEXT,
            limit_min TEXT,
            limit_max TEXT,
            deductible_min TEXT,
            deductible_max TEXT,
            premium_min TEXT,
            premium_max TEXT,
            rate_competitiveness_index TEXT NOT NULL DEFAULT '0',
            last_rate_change_pct TEXT,
            source_filing_count INTEGER NOT NULL DEFAULT 0,
            covered_property_types TEXT NOT NULL DEFAULT '[]',
            is_current INTEGER NOT NULL DEFAULT 1,
            computed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(carrier_id, state, line_of_business)
        );
    "#),
    ("TABLE_CHANGE_SIGNALS", r#"
        CREATE TABLE IF NOT EXISTS change_signals (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            kind TEXT NOT NULL,
            strength TEXT NOT NULL,
            previous_filing_id TEXT,
            current_filing_id TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '{}',
            acknowledged INTEGER NOT NULL DEFAULT 0,
            detected_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SCRAPE_LOGS", r#"
        CREATE TABLE IF NOT EXISTS scrape_logs (
            id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            status TEXT NOT NULL,
            filings_discovered INTEGER NOT NULL DEFAULT 0,
            filings_new INTEGER NOT NULL DEFAULT 0,
            documents_downloaded INTEGER NOT NULL DEFAULT 0,
            consecutive_errors INTEGER NOT NULL DEFAULT 0,
            warnings TEXT NOT NULL DEFAULT '[]',
            started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            finished_at DATETIME
        );
    "#),
    ("TABLE_PARSE_LOGS", r#"
        CREATE TABLE IF NOT EXISTS parse_logs (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL REFERENCES filing_documents(id),
            parser_type TEXT NOT NULL,
            tables_extracted INTEGER NOT NULL DEFAULT 0,
            rules_extracted INTEGER NOT NULL DEFAULT 0,
            forms_extracted INTEGER NOT NULL DEFAULT 0,
            factors_extracted INTEGER NOT NULL DEFAULT 0,
            confidence_avg TEXT NOT NULL DEFAULT '0',
            confidence_min TEXT NOT NULL DEFAULT '0',
            ai_calls_made INTEGER NOT NULL DEFAULT 0,
            ai_tokens_used INTEGER NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]',
            warnings TEXT NOT NULL DEFAULT '[]',
            duration_seconds TEXT NOT NULL DEFAULT '0',
            status TEXT NOT NULL,
            started_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            finished_at DATETIME
        );
    "#),
    ("TABLE_PARSE_REVIEW_QUEUE", r#"
        CREATE TABLE IF NOT EXISTS parse_review_queue (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL REFERENCES filing_documents(id),
            table_name TEXT NOT NULL,
            field_name TEXT NOT NULL,
            extracted_value TEXT,
            confidence TEXT NOT NULL,
            context_text TEXT,
            review_priority TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_PMI_RATE_CARDS", r#"
        CREATE TABLE IF NOT EXISTS pmi_rate_cards (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT,
            premium_type TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'manual',
            effective_date DATETIME NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("TABLE_PMI_RATE_CELLS", r#"
        CREATE TABLE IF NOT EXISTS pmi_rate_cells (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES pmi_rate_cards(id),
            ltv_min TEXT NOT NULL,
            ltv_max TEXT NOT NULL,
            fico_min INTEGER NOT NULL,
            fico_max INTEGER NOT NULL,
            coverage_pct TEXT NOT NULL,
            rate_pct TEXT NOT NULL
        );
    "#),
    ("TABLE_PMI_ADJUSTMENTS", r#"
        CREATE TABLE IF NOT EXISTS pmi_adjustments (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES pmi_rate_cards(id),
            name TEXT NOT NULL,
            condition TEXT NOT NULL DEFAULT '{}',
            method TEXT NOT NULL,
            value TEXT NOT NULL
        );
    "#),
    ("TABLE_PMI_QUOTE_LOG", r#"
        CREATE TABLE IF NOT EXISTS pmi_quote_log (
            id TEXT PRIMARY KEY,
            request TEXT NOT NULL,
            response_summary TEXT NOT NULL,
            carriers_quoted INTEGER NOT NULL DEFAULT 0,
            best_rate_pct TEXT,
            best_carrier_id TEXT,
            processing_time_ms TEXT NOT NULL DEFAULT '0',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_TITLE_RATE_CARDS", r#"
        CREATE TABLE IF NOT EXISTS title_rate_cards (
            id TEXT PRIMARY KEY,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            state TEXT NOT NULL,
            policy_type TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'manual',
            effective_date DATETIME NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 1,
            is_promulgated INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_TITLE_RATE_BANDS", r#"
        CREATE TABLE IF NOT EXISTS title_rate_bands (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES title_rate_cards(id),
            coverage_min TEXT NOT NULL,
            coverage_max TEXT NOT NULL,
            rate_per_thousand TEXT NOT NULL,
            flat_fee TEXT NOT NULL DEFAULT '0',
            minimum_premium TEXT NOT NULL DEFAULT '0'
        );
    "#),
    ("TABLE_TITLE_SIMULTANEOUS_ISSUE", r#"
        CREATE TABLE IF NOT EXISTS title_simultaneous_issue (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES title_rate_cards(id),
            loan_min TEXT NOT NULL,
            loan_max TEXT NOT NULL,
            discount_rate_per_thousand TEXT NOT NULL DEFAULT '0',
            discount_pct TEXT NOT NULL DEFAULT '0',
            flat_fee TEXT NOT NULL DEFAULT '0'
        );
    "#),
    ("TABLE_TITLE_REISSUE_CREDITS", r#"
        CREATE TABLE IF NOT EXISTS title_reissue_credits (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES title_rate_cards(id),
            years_since_min TEXT NOT NULL,
            years_since_max TEXT NOT NULL,
            credit_pct TEXT NOT NULL
        );
    "#),
    ("TABLE_TITLE_ENDORSEMENTS", r#"
        CREATE TABLE IF NOT EXISTS title_endorsements (
            id TEXT PRIMARY KEY,
            rate_card_id TEXT NOT NULL REFERENCES title_rate_cards(id),
            endorsement_code TEXT NOT NULL,
            flat_fee TEXT NOT NULL DEFAULT '0',
            rate_per_thousand TEXT NOT NULL DEFAULT '0',
            pct_of_base TEXT NOT NULL DEFAULT '0'
        );
    "#),
    ("TABLE_TITLE_QUOTE_LOG", r#"
        CREATE TABLE IF NOT EXISTS title_quote_log (
            id TEXT PRIMARY KEY,
            request TEXT NOT NULL,
            response_summary TEXT NOT NULL,
            carriers_quoted INTEGER NOT NULL DEFAULT 0,
            best_premium TEXT,
            best_carrier_id TEXT,
            processing_time_ms TEXT NOT NULL DEFAULT '0',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_CARRIER_RANKINGS", r#"
        CREATE TABLE IF NOT EXISTS carrier_rankings (
            id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            class_code TEXT NOT NULL,
            carrier_id TEXT NOT NULL REFERENCES carriers(id),
            rank INTEGER NOT NULL,
            estimated_premium_index TEXT,
            computed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(state, line_of_business, class_code, carrier_id)
        );
    "#),
    ("TABLE_MARKET_INTELLIGENCE", r#"
        CREATE TABLE IF NOT EXISTS market_intelligence (
            id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            line_of_business TEXT NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            avg_rate_change_pct TEXT,
            median_rate_change_pct TEXT,
            filing_count INTEGER NOT NULL DEFAULT 0,
            rate_increase_count INTEGER NOT NULL DEFAULT 0,
            rate_decrease_count INTEGER NOT NULL DEFAULT 0,
            new_entrants TEXT NOT NULL DEFAULT '[]',
            withdrawals TEXT NOT NULL DEFAULT '[]',
            top_signals TEXT NOT NULL DEFAULT '[]',
            market_trend TEXT NOT NULL DEFAULT 'stable',
            summary TEXT NOT NULL DEFAULT '',
            computed_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/// Columns added after the base tables shipped; tolerant of "duplicate
/// column name" failures so re-running this migration set is always safe.
const COLUMN_ADDITIONS: &[(&str, &str)] = &[
    ("FILING_SUPERSEDED_BY_FK", "ALTER TABLE rate_filing_records ADD COLUMN superseded_by TEXT"),
];

const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    (
        "IDX_FILING_CURRENT_NATURAL_KEY",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_filing_current_natural_key \
         ON rate_filing_records(carrier_id, state, tracking_number) WHERE is_current = 1;",
    ),
    (
        "IDX_RATE_TABLE_CURRENT",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_rate_table_current \
         ON rate_table_records(carrier_id, state, line_of_business) WHERE is_current = 1;",
    ),
    (
        "IDX_RULE_SET_CURRENT",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_rule_set_current \
         ON rule_set_records(carrier_id, state, line_of_business) WHERE is_current = 1;",
    ),
    (
        "IDX_FILING_STATE_LINE",
        "CREATE INDEX IF NOT EXISTS idx_filing_state_line ON rate_filing_records(state, line_of_business);",
    ),
    (
        "IDX_FORM_PROVISIONS_FORM",
        "CREATE INDEX IF NOT EXISTS idx_form_provisions_form ON form_provisions(form_id);",
    ),
    (
        "IDX_DOCUMENTS_UNPARSED",
        "CREATE INDEX IF NOT EXISTS idx_documents_unparsed ON filing_documents(parsed_at);",
    ),
    (
        "IDX_CHANGE_SIGNALS_CARRIER",
        "CREATE INDEX IF NOT EXISTS idx_change_signals_carrier ON change_signals(carrier_id, state);",
    ),
    (
        "IDX_REVIEW_QUEUE_PRIORITY",
        "CREATE INDEX IF NOT EXISTS idx_review_queue_priority ON parse_review_queue(review_priority, created_at);",
    ),
    (
        "IDX_PMI_RATE_CARD_CURRENT",
        "CREATE INDEX IF NOT EXISTS idx_pmi_rate_card_current \
         ON pmi_rate_cards(carrier_id, premium_type, state) WHERE is_current = 1;",
    ),
    (
        "IDX_PMI_RATE_CELLS_CARD",
        "CREATE INDEX IF NOT EXISTS idx_pmi_rate_cells_card ON pmi_rate_cells(rate_card_id);",
    ),
    (
        "IDX_PMI_ADJUSTMENTS_CARD",
        "CREATE INDEX IF NOT EXISTS idx_pmi_adjustments_card ON pmi_adjustments(rate_card_id);",
    ),
    (
        "IDX_TITLE_RATE_CARD_CURRENT",
        "CREATE INDEX IF NOT EXISTS idx_title_rate_card_current \
         ON title_rate_cards(carrier_id, state, policy_type) WHERE is_current = 1;",
    ),
    (
        "IDX_TITLE_RATE_BANDS_CARD",
        "CREATE INDEX IF NOT EXISTS idx_title_rate_bands_card ON title_rate_bands(rate_card_id);",
    ),
    (
        "IDX_MARKET_INTELLIGENCE_STATE_LINE",
        "CREATE INDEX IF NOT EXISTS idx_market_intelligence_state_line \
         ON market_intelligence(state, line_of_business, computed_at DESC);",
    ),
    (
        "IDX_CARRIER_RANKINGS_CLASS",
        "CREATE INDEX IF NOT EXISTS idx_carrier_rankings_class \
         ON carrier_rankings(state, line_of_business, class_code);",
    ),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("applying schema migrations");
    create_tables(conn).await?;
    add_columns(conn).await?;
    create_indexes(conn).await?;
    info!("schema migrations applied");
    Ok(())
}

async fn create_tables(conn: &Connection) -> Result<()> {
    for (name, sql) in BASE_TABLES {
        debug!("creating table: {}", name);
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create table {name}"))?;
    }
    Ok(())
}

async fn add_columns(conn: &Connection) -> Result<()> {
    for (name, sql) in COLUMN_ADDITIONS {
        match conn.execute(sql, ()).await {
            Ok(_) => debug!("added column: {}", name),
            Err(e) if e.to_string().contains("duplicate column name") => {
                debug!("column already present: {}", name);
            }
            Err(e) => warn!("column addition {} failed: {}", name, e),
        }
    }
    Ok(())
}

async fn create_indexes(conn: &Connection) -> Result<()> {
    for (name, sql) in ACCELERATION_INDEXES {
        debug!("creating index: {}", name);
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create index {name}"))?;
    }
    Ok(())
}
