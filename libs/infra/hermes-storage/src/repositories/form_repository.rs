// [libs/infra/hermes-storage/src/repositories/form_repository.rs]
//! Policy forms and their extracted provisions. One form row per source
//! document (idempotent on `source_document_id`), many provisions per
//! form.

use crate::client::StorageClient;
use crate::errors::StorageError;
use chrono::Utc;
use hermes_models::filing::LineOfBusiness;
use hermes_models::forms::{FormProvision, FormType, PolicyFormRecord, ProvisionType};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct FormRepository {
    client: StorageClient,
}

impl FormRepository {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self))]
    pub async fn upsert_form(
        &self,
        filing_id: Uuid,
        carrier_id: Uuid,
        state: &str,
        line_of_business: LineOfBusiness,
        form_number: &str,
        form_name: Option<&str>,
        form_edition_date: Option<&str>,
        form_type: FormType,
        is_manuscript: bool,
        source_document_id: Uuid,
        confidence: Decimal,
    ) -> Result<PolicyFormRecord, StorageError> {
        let conn = self.client.connection()?;

        let existing_id: Option<String> = {
            let mut rows = conn
                .query(
                    "SELECT id FROM policy_forms WHERE source_document_id = ?1",
                    libsql::params![source_document_id.to_string()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => Some(row.get::<String>(0)?),
                None => None,
            }
        };

        let id = match existing_id {
            Some(id) => Uuid::parse_str(&id).map_err(|e| StorageError::Mapping(e.to_string()))?,
            None => Uuid::new_v4(),
        };

        conn.execute(
            "INSERT INTO policy_forms \
             (id, filing_id, carrier_id, state, line_of_business, form_number, form_name, \
              form_edition_date, form_type, is_manuscript, source_document_id, confidence) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12) \
             ON CONFLICT(source_document_id) DO UPDATE SET \
               form_number = excluded.form_number, form_name = excluded.form_name, \
               form_edition_date = excluded.form_edition_date, form_type = excluded.form_type, \
               is_manuscript = excluded.is_manuscript, confidence = excluded.confidence",
            libsql::params![
                id.to_string(),
                filing_id.to_string(),
                carrier_id.to_string(),
                state,
                line_of_business_str(line_of_business),
                form_number,
                form_name,
                form_edition_date,
                form_type_str(form_type),
                is_manuscript,
                source_document_id.to_string(),
                confidence.to_string(),
            ],
        )
        .await?;

        Ok(PolicyFormRecord {
            id,
            filing_id,
            carrier_id,
            state: state.to_string(),
            line_of_business,
            form_number: form_number.to_string(),
            form_name: form_name.map(str::to_string),
            form_edition_date: form_edition_date.map(str::to_string),
            form_type,
            is_manuscript,
            source_document_id,
            confidence,
            created_at: Utc::now(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, provision_text_summary, provision_text_full))]
    pub async fn insert_provision(
        &self,
        form_id: Uuid,
        provision_type: ProvisionType,
        provision_key: Option<&str>,
        provision_text_summary: &str,
        provision_text_full: Option<&str>,
        section_reference: Option<&str>,
        is_coverage_broadening: Option<bool>,
        is_coverage_restricting: Option<bool>,
        iso_comparison_notes: Option<&str>,
        confidence: Decimal,
    ) -> Result<FormProvision, StorageError> {
        let conn = self.client.connection()?;
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO form_provisions \
             (id, form_id, provision_type, provision_key, provision_text_summary, \
              provision_text_full, section_reference, is_coverage_broadening, \
              is_coverage_restricting, iso_comparison_notes, confidence) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            libsql::params![
                id.to_string(),
                form_id.to_string(),
                provision_type_str(provision_type),
                provision_key,
                provision_text_summary,
                provision_text_full,
                section_reference,
                is_coverage_broadening,
                is_coverage_restricting,
                iso_comparison_notes,
                confidence.to_string(),
            ],
        )
        .await?;

        Ok(FormProvision {
            id,
            form_id,
            provision_type,
            provision_key: provision_key.map(str::to_string),
            provision_text_summary: provision_text_summary.to_string(),
            provision_text_full: provision_text_full.map(str::to_string),
            section_reference: section_reference.map(str::to_string),
            is_coverage_broadening,
            is_coverage_restricting,
            iso_comparison_notes: iso_comparison_notes.map(str::to_string),
            confidence,
        })
    }
}

fn line_of_business_str(l: LineOfBusiness) -> &'static str {
    match l {
        LineOfBusiness::Pmi => "pmi",
        LineOfBusiness::Title => "title",
    }
}

fn form_type_str(t: FormType) -> &'static str {
    match t {
        FormType::Policy => "policy",
        FormType::Endorsement => "endorsement",
        FormType::Application => "application",
        FormType::Schedule => "schedule",
        FormType::Certificate => "certificate",
        FormType::Notice => "notice",
        FormType::Declarations => "declarations",
    }
}

fn provision_type_str(p: ProvisionType) -> &'static str {
    match p {
        ProvisionType::CoverageGrant => "coverage_grant",
        ProvisionType::Exclusion => "exclusion",
        ProvisionType::Condition => "condition",
        ProvisionType::Definition => "definition",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_form_is_idempotent_on_source_document() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let repo = FormRepository::new(client.clone());

        let carrier_id = Uuid::new_v4();
        let filing_id = Uuid::new_v4();
        let document_id = Uuid::new_v4();
        let conn = client.connection().unwrap();
        conn.execute(
            "INSERT INTO carriers (id, naic_code, name) VALUES (?1, 'X', 'X')",
            libsql::params![carrier_id.to_string()],
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO rate_filing_records (id, carrier_id, state, line_of_business, \
             tracking_number, filing_type, status) VALUES (?1, ?2, 'TX', 'pmi', 'T1', 'form', 'approved')",
            libsql::params![filing_id.to_string(), carrier_id.to_string()],
        )
        .await
        .unwrap();

        let first = repo
            .upsert_form(
                filing_id,
                carrier_id,
                "TX",
                LineOfBusiness::Pmi,
                "CG 20 10",
                Some("Additional Insured"),
                Some("04/13"),
                FormType::Endorsement,
                false,
                document_id,
                Decimal::new(90, 2),
            )
            .await
            .unwrap();

        let second = repo
            .upsert_form(
                filing_id,
                carrier_id,
                "TX",
                LineOfBusiness::Pmi,
                "CG 20 10",
                Some("Additional Insured - Revised"),
                Some("04/13"),
                FormType::Endorsement,
                false,
                document_id,
                Decimal::new(95, 2),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }
}
