// [apps/hermes-runner/src/main.rs]
//! Command-line entry point dispatching one of the scheduled tasks
//! against the configured storage and LLM backends. Intended to be
//! invoked by an external scheduler (cron, a workflow engine) once per
//! task per run — there is no long-lived server process here.

use clap::Parser;
use dotenvy::dotenv;
use hermes_config::Settings;
use hermes_runner::Cli;
use tracing::error;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    hermes_telemetry::init_tracing("hermes_runner");

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let settings = Settings::from_env()?;
        match hermes_runner::run(cli, settings).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "task run failed");
                std::process::exit(1);
            }
        }
    })
}
