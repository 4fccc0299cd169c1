// [apps/hermes-runner/src/bin/migrator.rs]
//! Applies the storage schema against `DATABASE_URL` and exits. Every
//! `StorageClient::connect` call already runs this migration, so this
//! binary exists only to let an operator apply it ahead of a deploy
//! without also having to construct the rest of `Deps`.

use hermes_config::Settings;
use hermes_storage::StorageClient;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    hermes_telemetry::init_tracing("hermes_migrator");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let settings = Settings::from_env()?;
        info!(database_url = %settings.database_url, "applying storage schema");

        match StorageClient::connect(&settings.database_url, settings.database_auth_token.clone()).await {
            Ok(_) => {
                info!("schema applied successfully");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "schema migration failed");
                std::process::exit(1);
            }
        }
    })
}
