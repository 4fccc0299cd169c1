// [apps/hermes-runner/src/lib.rs]
//! CLI plumbing for the task-dispatch binary: argument parsing and the
//! thin `run` function `main.rs` calls after building a tokio runtime.

use clap::{Parser, Subcommand};
use hermes_config::Settings;
use hermes_tasks::{Deps, TaskOutcome};

#[derive(Parser)]
#[command(name = "hermes-runner", about = "Runs one Hermes scheduled task and exits")]
pub struct Cli {
    #[command(subcommand)]
    pub task: Task,
}

#[derive(Subcommand)]
pub enum Task {
    /// Crawl configured state SERFF portals for new/changed PMI and title filings.
    DailyScrapeIncremental,
    /// Same listing/detail pass, restricted to Title-line filings.
    ScrapeTitleFilings,
    /// Parse documents claimed since the last run into rate tables, rules, and forms.
    ParseNewFilings,
    /// Same claim/classify/route pipeline, restricted to Title-line documents.
    ParseTitleFilings,
    /// Diff freshly recorded filings against history and emit change signals.
    DetectAppetiteShifts,
    /// Recompute appetite profiles for carriers with newly parsed rate tables.
    RecomputeAppetiteProfiles,
    /// Generate the rolling market report for every active state/line.
    GenerateMarketReport,
    /// Mark appetite profiles that have aged past the staleness window.
    StaleDataCheck,
    /// Report pipeline health: parse backlog, stuck scrapes, unacknowledged signals.
    HealthCheck,
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Task::DailyScrapeIncremental => "daily_scrape_incremental",
            Task::ScrapeTitleFilings => "scrape_title_filings",
            Task::ParseNewFilings => "parse_new_filings",
            Task::ParseTitleFilings => "parse_title_filings",
            Task::DetectAppetiteShifts => "detect_appetite_shifts",
            Task::RecomputeAppetiteProfiles => "recompute_appetite_profiles",
            Task::GenerateMarketReport => "generate_market_report",
            Task::StaleDataCheck => "stale_data_check",
            Task::HealthCheck => "health_check",
        }
    }
}

/// Connects once and dispatches the requested task, printing its
/// summary or health report as JSON on stdout.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let deps = Deps::connect(settings).await?;
    let outcome = hermes_tasks::dispatch(cli.task.name(), &deps).await?;

    match &outcome {
        TaskOutcome::Summary(summary) => println!("{}", serde_json::to_string_pretty(summary)?),
        TaskOutcome::Health(report) => println!("{}", serde_json::to_string_pretty(report)?),
    }

    Ok(())
}
