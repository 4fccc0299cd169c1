// [apps/hermes-runner/src/bin/seed.rs]
//! Seeds the five national PMI carriers the daily scrape iterates by
//! default. Idempotent: `upsert_carrier` is a no-op if the NAIC code is
//! already present.

use hermes_config::Settings;
use hermes_storage::repositories::FilingRepository;
use hermes_storage::StorageClient;
use tracing::info;

const PMI_CARRIERS: &[(&str, &str)] = &[
    ("29858", "MGIC Investment Corporation"),
    ("40266", "Arch Mortgage Insurance Company"),
    ("13634", "Essent Guaranty Inc"),
    ("38458", "Enact Mortgage Insurance Corporation"),
    ("13695", "National Mortgage Insurance Corporation"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    hermes_telemetry::init_tracing("hermes_seed");

    let settings = Settings::from_env()?;
    let client = StorageClient::connect(&settings.database_url, settings.database_auth_token.clone()).await?;
    let filing_repository = FilingRepository::new(client);

    for (naic, name) in PMI_CARRIERS {
        let carrier = filing_repository.upsert_carrier(naic, name).await?;
        info!(naic_code = %carrier.naic_code, name = %carrier.name, "carrier seeded");
    }

    info!("seed complete, {} carriers present", PMI_CARRIERS.len());
    Ok(())
}
