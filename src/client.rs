// Upstream flight-offer search client
// Talks to the Amadeus self-service API: OAuth2 client-credentials token plus
// the v2 flight-offers search, with retries for transient failures.

use crate::auth::{TokenCache, TokenResponse};
use crate::offer::OfferSearchResponse;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://test.api.amadeus.com";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_MAX_RESULTS: u32 = 50;
// Upper bound accepted by the upstream search endpoint
pub const MAX_RESULTS_LIMIT: u32 = 250;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid IATA code '{0}'. Must be 3 uppercase letters.")]
    InvalidAirportCode(String),

    #[error("Destination must be different from origin")]
    SameOriginAndDestination,

    #[error("Invalid date '{0}'. Use YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("Return date must be after departure date")]
    ReturnBeforeDeparture,

    #[error("At least one adult passenger is required")]
    NoPassengers,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Flight search API credentials not configured")]
    MissingCredentials,

    #[error("Failed to get access token: {0}")]
    AuthenticationFailed(String),

    #[error("Access token rejected")]
    Unauthorized,

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError {
        status_code: u16,
        message: String,
        is_retryable: bool,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid search parameters: {0}")]
    InvalidParams(#[from] ValidationError),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError(_)
            | ApiError::Timeout(_)
            | ApiError::Unauthorized
            | ApiError::RateLimitExceeded(_) => true,
            ApiError::ApiResponseError { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }

    // Message suitable for showing to the person who ran the search
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) => {
                "Unable to connect to the server. Please check your internet connection."
                    .to_string()
            }
            ApiError::ApiResponseError {
                status_code: 404, ..
            } => "Flight search service is not available. Please try again later.".to_string(),
            ApiError::ApiResponseError { status_code, .. } => {
                format!("Server error ({}). Please try again later.", status_code)
            }
            ApiError::RateLimitExceeded(_) => {
                "Server error (429). Please try again later.".to_string()
            }
            ApiError::Unauthorized | ApiError::AuthenticationFailed(_) => {
                "Failed to authenticate with the flight search service.".to_string()
            }
            ApiError::MissingCredentials => {
                "Flight search API credentials not configured.".to_string()
            }
            ApiError::InvalidResponse(_) => {
                "Received an invalid response from the server. Please try again.".to_string()
            }
            ApiError::InvalidParams(e) => e.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_ms: u64,
    pub currency_code: String,
    pub max_results: u32,
    pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            timeout_ms: 10_000,
            currency_code: DEFAULT_CURRENCY.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            retry_config: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelClass::Economy => "ECONOMY",
            TravelClass::PremiumEconomy => "PREMIUM_ECONOMY",
            TravelClass::Business => "BUSINESS",
            TravelClass::First => "FIRST",
        }
    }
}

impl fmt::Display for TravelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "ECONOMY" => Ok(TravelClass::Economy),
            "PREMIUM_ECONOMY" => Ok(TravelClass::PremiumEconomy),
            "BUSINESS" => Ok(TravelClass::Business),
            "FIRST" => Ok(TravelClass::First),
            _ => Err(format!("Unknown travel class: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub adults: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_class: Option<TravelClass>,
    #[serde(default)]
    pub non_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u32>,
}

impl SearchParams {
    pub fn new(origin: &str, destination: &str, departure_date: &str, adults: u32) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: departure_date.to_string(),
            return_date: None,
            adults,
            travel_class: None,
            non_stop: false,
            max_price: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.origin.is_empty() {
            return Err(ValidationError::MissingParameter("origin"));
        }
        if self.destination.is_empty() {
            return Err(ValidationError::MissingParameter("destination"));
        }
        if self.departure_date.is_empty() {
            return Err(ValidationError::MissingParameter("departureDate"));
        }
        if self.adults == 0 {
            return Err(ValidationError::NoPassengers);
        }

        for code in [&self.origin, &self.destination] {
            if !is_iata_code(code) {
                return Err(ValidationError::InvalidAirportCode(code.clone()));
            }
        }
        if self.origin == self.destination {
            return Err(ValidationError::SameOriginAndDestination);
        }

        let departure = parse_date(&self.departure_date)?;
        if let Some(return_date) = &self.return_date {
            if parse_date(return_date)? < departure {
                return Err(ValidationError::ReturnBeforeDeparture);
            }
        }

        Ok(())
    }

    pub fn query_pairs(&self, currency_code: &str, max_results: u32) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("originLocationCode", self.origin.clone()),
            ("destinationLocationCode", self.destination.clone()),
            ("departureDate", self.departure_date.clone()),
            ("adults", self.adults.to_string()),
            ("currencyCode", currency_code.to_string()),
            ("max", max_results.to_string()),
        ];

        if let Some(return_date) = &self.return_date {
            pairs.push(("returnDate", return_date.clone()));
        }
        if let Some(travel_class) = self.travel_class {
            pairs.push(("travelClass", travel_class.as_str().to_string()));
        }
        if self.non_stop {
            pairs.push(("nonStop", "true".to_string()));
        }
        if let Some(max_price) = self.max_price.filter(|p| *p > 0) {
            pairs.push(("maxPrice", max_price.to_string()));
        }

        pairs
    }
}

fn is_iata_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

fn parse_date(date: &str) -> Result<NaiveDate, ValidationError> {
    let shaped = date.len() == 10
        && date
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !shaped {
        return Err(ValidationError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(date.to_string()))
}

fn is_loopback(base_url: &str) -> bool {
    let host = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    host == "localhost" || host == "127.0.0.1"
}

pub fn error_for_status(status_code: u16, body: String) -> ApiError {
    match status_code {
        401 => ApiError::Unauthorized,
        429 => ApiError::RateLimitExceeded(body),
        500..=599 => ApiError::ApiResponseError {
            status_code,
            message: body,
            is_retryable: true,
        },
        _ => ApiError::ApiResponseError {
            status_code,
            message: body,
            is_retryable: false,
        },
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientStats {
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub token_refreshes: usize,
    pub average_response_time_ms: f64,
}

// The upstream fetch the orchestrator depends on
#[async_trait]
pub trait OfferSearch: Send + Sync + 'static {
    async fn search_offers(&self, params: &SearchParams) -> Result<OfferSearchResponse, ApiError>;
}

pub struct AmadeusClient {
    config: ClientConfig,
    http: reqwest::Client,
    tokens: TokenCache,
    // Serializes token refreshes so concurrent searches share one request
    refresh_lock: tokio::sync::Mutex<()>,
    stats: Mutex<ClientStats>,
}

impl AmadeusClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::ConfigError("base_url must not be empty".to_string()));
        }
        if config.max_results == 0 || config.max_results > MAX_RESULTS_LIMIT {
            return Err(ClientError::ConfigError(format!(
                "max_results must be between 1 and {}",
                MAX_RESULTS_LIMIT
            )));
        }

        let mut builder = reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms));
        // Local endpoints are never reached through a system proxy
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            config,
            http,
            tokens: TokenCache::default(),
            refresh_lock: tokio::sync::Mutex::new(()),
            stats: Mutex::new(ClientStats::default()),
        })
    }

    pub fn stats(&self) -> ClientStats {
        self.stats.lock().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.tokens.get(Instant::now()) {
            return Ok(token);
        }

        let _refresh = self.refresh_lock.lock().await;
        // Another search may have refreshed while we waited
        if let Some(token) = self.tokens.get(Instant::now()) {
            return Ok(token);
        }

        let (client_id, client_secret) =
            match (&self.config.client_id, &self.config.client_secret) {
                (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
                _ => return Err(ApiError::MissingCredentials),
            };

        debug!("Requesting new access token");
        let issued_at = Instant::now();
        let response = self
            .http
            .post(self.url("/v1/security/oauth2/token"))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthenticationFailed(body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        self.stats.lock().token_refreshes += 1;
        Ok(self.tokens.store(token, issued_at))
    }

    async fn fetch_offers(&self, params: &SearchParams) -> Result<OfferSearchResponse, ApiError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .get(self.url("/v2/shopping/flight-offers"))
            .bearer_auth(token)
            .query(&params.query_pairs(&self.config.currency_code, self.config.max_results))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), body));
        }

        response
            .json::<OfferSearchResponse>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn record_response_time(&self, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock();
        let completed = (stats.requests_succeeded + stats.requests_failed) as f64;
        stats.average_response_time_ms = if completed <= 1.0 {
            elapsed_ms
        } else {
            (stats.average_response_time_ms * (completed - 1.0) + elapsed_ms) / completed
        };
    }

    // Helper to calculate exponential backoff with jitter
    pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
        let base_backoff_ms = (config.initial_backoff_ms as f64
            * config.backoff_multiplier.powf(retry_attempt as f64))
        .min(config.max_backoff_ms as f64);

        // Apply jitter to prevent thundering herd
        let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms as u64)
    }
}

#[async_trait]
impl OfferSearch for AmadeusClient {
    async fn search_offers(&self, params: &SearchParams) -> Result<OfferSearchResponse, ApiError> {
        params.validate()?;

        info!(
            "Searching flights: {} -> {} on {}",
            params.origin, params.destination, params.departure_date
        );

        let started = Instant::now();
        let retry_config = &self.config.retry_config;
        let mut attempt = 0;

        loop {
            self.stats.lock().requests_sent += 1;

            let error = match self.fetch_offers(params).await {
                Ok(response) => {
                    self.stats.lock().requests_succeeded += 1;
                    self.record_response_time(started);
                    info!("Found {} flights", response.data.len());
                    return Ok(response);
                }
                Err(error) => error,
            };

            if matches!(error, ApiError::Unauthorized) {
                self.tokens.clear();
            }

            if attempt >= retry_config.max_retries || !error.is_retryable() {
                self.stats.lock().requests_failed += 1;
                self.record_response_time(started);
                warn!("Flight search failed: {}", error);
                return Err(error);
            }

            let backoff = Self::calculate_backoff(attempt, retry_config);
            self.stats.lock().requests_retried += 1;
            warn!(
                "Flight search attempt {} failed ({}), retrying in {:?}",
                attempt + 1,
                error,
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
