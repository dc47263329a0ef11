// Layered application settings: defaults, then an optional file, then environment
use crate::client::{
    ClientConfig, RetryConfig, DEFAULT_BASE_URL, DEFAULT_CURRENCY, DEFAULT_MAX_RESULTS,
};
use crate::history::DEFAULT_HISTORY_FILE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "flight_search";
pub const ENV_PREFIX: &str = "FLIGHT_SEARCH";
// Plain AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET are honoured too
pub const CREDENTIALS_ENV_PREFIX: &str = "AMADEUS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_ms: u64,
    pub currency_code: String,
    pub max_results: u32,
    pub retry: RetryConfig,
    pub history_enabled: bool,
    pub history_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            timeout_ms: 10_000,
            currency_code: DEFAULT_CURRENCY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            retry: RetryConfig::default(),
            history_enabled: true,
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

impl AppConfig {
    // `file` replaces the optional ./flight_search.{toml,json} lookup and must exist
    pub fn load(file: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        Self::load_with_env(
            file,
            ::config::Environment::with_prefix(CREDENTIALS_ENV_PREFIX).prefix_separator("_"),
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
    }

    fn load_with_env(
        file: Option<&Path>,
        credentials_env: ::config::Environment,
        env: ::config::Environment,
    ) -> Result<Self, ::config::ConfigError> {
        let file_source = match file {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(CONFIG_FILE_NAME).required(false),
        };

        ::config::Config::builder()
            .add_source(file_source)
            .add_source(credentials_env)
            // Prefixed variables win over everything else
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone().filter(|id| !id.is_empty()),
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            timeout_ms: self.timeout_ms,
            currency_code: self.currency_code.clone(),
            max_results: self.max_results,
            retry_config: self.retry.clone(),
        }
    }

    pub fn history_path(&self) -> Option<&Path> {
        self.history_enabled.then_some(self.history_file.as_path())
    }
}
