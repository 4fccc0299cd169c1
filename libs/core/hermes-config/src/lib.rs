// [libs/core/hermes-config/src/lib.rs]
//! Process configuration, loaded once from environment variables.
//!
//! No config files, no hierarchical merging, no remote config service —
//! matching the scope of the original `hermes` configuration module.

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[config_missing]: required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("[config_invalid]: environment variable {name} could not be parsed: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection string for the storage layer. For the embedded/local
    /// libsql engine this is a filesystem path or `:memory:`; for a
    /// remote Turso-compatible endpoint it is an `https://` or
    /// `libsql://` URL.
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub storage_pool_max_connections: u32,

    /// External LLM used by the parser layer. Deliberately vendor-neutral:
    /// no specific provider is named anywhere in this configuration.
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    pub serff_base_url: String,
    pub scrape_delay: Duration,
    pub scrape_max_retries: u32,
    pub scrape_session_timeout: Duration,
    pub scrape_states: Vec<String>,
    pub socks_proxy_url: Option<String>,

    pub filing_storage_path: String,

    pub hermes_api_key: String,
    pub hermes_api_port: u16,

    pub log_level: String,
}

impl Settings {
    /// Loads settings from the process environment, falling back to the
    /// same defaults as the original Python configuration where no
    /// other value is mandated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./data/hermes.db".to_string()),
            database_auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
            storage_pool_max_connections: parse_env_or("STORAGE_POOL_MAX_CONNECTIONS", 10),

            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_api_base_url: env::var("LLM_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.example-llm.invalid/v1".to_string()),
            llm_model_name: env::var("LLM_MODEL_NAME")
                .unwrap_or_else(|_| "general-purpose-large".to_string()),

            serff_base_url: env::var("SERFF_BASE_URL")
                .unwrap_or_else(|_| "https://filingaccess.serff.com".to_string()),
            scrape_delay: Duration::from_secs_f64(parse_env_or("SCRAPE_DELAY_SECONDS", 3.0)),
            scrape_max_retries: parse_env_or("SCRAPE_MAX_RETRIES", 3),
            scrape_session_timeout: Duration::from_secs(parse_env_or(
                "SCRAPE_SESSION_TIMEOUT",
                300,
            )),
            scrape_states: env::var("SCRAPE_STATES")
                .map(|v| v.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|_| {
                    ["CA", "TX", "FL", "NY", "PA", "IL", "OH", "MI", "NC", "WI"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
            socks_proxy_url: env::var("SOCKS_PROXY_URL").ok(),

            filing_storage_path: env::var("FILING_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/filings".to_string()),

            hermes_api_key: env::var("HERMES_API_KEY")
                .unwrap_or_else(|_| "hermes-dev-key-change-me".to_string()),
            hermes_api_port: parse_env_or("HERMES_API_PORT", 8001),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &'static str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        for var in [
            "DATABASE_URL",
            "LLM_API_KEY",
            "SCRAPE_DELAY_SECONDS",
            "HERMES_API_PORT",
        ] {
            env::remove_var(var);
        }
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.hermes_api_port, 8001);
        assert_eq!(settings.scrape_delay, Duration::from_secs_f64(3.0));
        assert_eq!(settings.scrape_max_retries, 3);
    }

    #[test]
    fn explicit_env_overrides_default() {
        env::set_var("HERMES_API_PORT", "9100");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.hermes_api_port, 9100);
        env::remove_var("HERMES_API_PORT");
    }
}
