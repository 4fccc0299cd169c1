// [libs/domain/hermes-tasks/src/deps.rs]
//! Wires every repository and outbound client a task function needs,
//! built once per process from `Settings` and shared across every task
//! dispatched in that run.

use hermes_appetite::{AppetiteProfiler, ChangeDetector};
use hermes_config::Settings;
use hermes_llm_client::LlmClient;
use hermes_storage::repositories::{
    AppetiteRepository, FilingRepository, FormRepository, MarketRepository, ParseLogRepository,
    PmiRateRepository, RateTableRepository, RuleSetRepository, ScrapeLogRepository, TitleRateRepository,
};
use hermes_storage::StorageClient;

use crate::errors::TaskError;

#[derive(Clone)]
pub struct Deps {
    pub settings: Settings,
    pub filing_repository: FilingRepository,
    pub rate_table_repository: RateTableRepository,
    pub rule_set_repository: RuleSetRepository,
    pub form_repository: FormRepository,
    pub parse_log_repository: ParseLogRepository,
    pub scrape_log_repository: ScrapeLogRepository,
    pub appetite_repository: AppetiteRepository,
    pub market_repository: MarketRepository,
    pub pmi_rate_repository: PmiRateRepository,
    pub title_rate_repository: TitleRateRepository,
    pub llm_client: LlmClient,
}

impl Deps {
    pub async fn connect(settings: Settings) -> Result<Self, TaskError> {
        let client = StorageClient::connect(&settings.database_url, settings.database_auth_token.clone()).await?;

        let llm_client = LlmClient::new(
            settings.llm_api_base_url.clone(),
            settings.llm_api_key.clone(),
            settings.llm_model_name.clone(),
        );

        Ok(Self {
            filing_repository: FilingRepository::new(client.clone()),
            rate_table_repository: RateTableRepository::new(client.clone()),
            rule_set_repository: RuleSetRepository::new(client.clone()),
            form_repository: FormRepository::new(client.clone()),
            parse_log_repository: ParseLogRepository::new(client.clone()),
            scrape_log_repository: ScrapeLogRepository::new(client.clone()),
            appetite_repository: AppetiteRepository::new(client.clone()),
            market_repository: MarketRepository::new(client.clone()),
            pmi_rate_repository: PmiRateRepository::new(client.clone()),
            title_rate_repository: TitleRateRepository::new(client.clone()),
            llm_client,
            settings,
        })
    }

    pub fn change_detector(&self) -> ChangeDetector {
        ChangeDetector::new(
            self.filing_repository.clone(),
            self.rate_table_repository.clone(),
            self.appetite_repository.clone(),
        )
    }

    pub fn appetite_profiler(&self) -> AppetiteProfiler {
        AppetiteProfiler::new(
            self.rate_table_repository.clone(),
            self.filing_repository.clone(),
            self.appetite_repository.clone(),
        )
    }

    pub fn alert_manager(&self) -> hermes_alerts::AlertManager {
        hermes_alerts::AlertManager::new(self.appetite_repository.clone(), self.filing_repository.clone())
    }

    pub fn market_report_generator(&self) -> hermes_alerts::MarketReportGenerator {
        hermes_alerts::MarketReportGenerator::new(self.market_repository.clone())
    }
}
