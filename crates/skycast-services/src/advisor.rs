//! Client for the weather activity advisor proxy.
//!
//! The proxy holds the language-model credentials; this client only builds
//! the prompt from the current conditions and POSTs it with retries.

use std::time::Duration;

use chrono::{DateTime, Local};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use skycast_core::{AdvisorConfig, AppError, NetworkError, ReqwestErrorExt};
use skycast_weather::{ForecastData, LocationRecord, UnitPreferences, WeatherCondition};
use thiserror::Error;

use crate::retry::{is_retryable_status, with_retry, RetryConfig, RetryDecision, RetryError};

pub const DEFAULT_ADVICE_QUERY: &str = "Suggest an indoor activity and a comfortable outfit.";

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful and creative Weather Activity Advisor. \
Your goal is to give personalized, safe, and fun activity suggestions based on current weather \
conditions and the user's query.";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The proxy answered with an error status; `message` is its `error` field when present
    #[error("{message}")]
    Proxy { status: u16, message: String },

    #[error("Received an empty or malformed response from the advice service.")]
    EmptyResponse,

    #[error("Failed to get AI advice after {attempts} attempts. Check if the advice proxy is running on {url}.")]
    Exhausted {
        attempts: u32,
        url: String,
        #[source]
        last: Box<AdvisorError>,
    },
}

impl AdvisorError {
    /// Whether another attempt could succeed.
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            AdvisorError::Network(NetworkError::ServerError { status, .. })
            | AdvisorError::Proxy { status, .. } => StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(RetryDecision::NoRetry),
            AdvisorError::Network(_) | AdvisorError::EmptyResponse => RetryDecision::Retry,
            AdvisorError::Exhausted { .. } => RetryDecision::NoRetry,
        }
    }
}

impl From<AdvisorError> for AppError {
    fn from(e: AdvisorError) -> Self {
        match e {
            AdvisorError::Network(e) => AppError::Network(e),
            other => AppError::Service(other.to_string()),
        }
    }
}

/// Body POSTed to the advice proxy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub user_prompt: String,
    pub system_instruction: String,
}

impl AdviceRequest {
    /// Wrap the weather context and the user's question into the advisor prompt.
    pub fn new(weather_context: &str, user_request: &str) -> Self {
        let user_prompt = format!(
            "Analyze the following weather data and provide thoughtful, practical advice and \
suggestions based on the user's request.\n\
Keep your response professional, friendly, and helpful.\n\n\
--- CURRENT WEATHER DATA ---\n{weather_context}\n\
--- USER REQUEST ---\n{user_request}\n"
        );
        Self {
            user_prompt,
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdviceResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyErrorBody {
    error: Option<String>,
}

/// Describe current conditions for the prompt.
///
/// `forecast` must already be converted to `units`.
pub fn build_weather_context(
    location: Option<&LocationRecord>,
    forecast: Option<&ForecastData>,
    units: &UnitPreferences,
    now: DateTime<Local>,
) -> String {
    let (Some(location), Some(forecast)) = (location, forecast) else {
        return "Current weather data is unavailable.".to_string();
    };

    let current = &forecast.current;
    let condition = WeatherCondition::from_wmo_code(current.weather_code);

    format!(
        "Location: {}, {}\n\
Current Time: {}\n\
Temperature: {:.1}{}\n\
Condition: {} (code {})\n\
Wind Speed: {:.1}{}\n\
Precipitation: {:.2}{}\n\
Humidity: {:.0}%",
        location.name,
        location.country,
        now.format("%H:%M"),
        current.temperature_2m,
        units.temperature.symbol(),
        condition.description(),
        current.weather_code,
        current.wind_speed_10m,
        units.wind.symbol(),
        current.rain,
        units.precipitation.symbol(),
        current.relative_humidity_2m,
    )
}

#[derive(Debug, Clone)]
pub struct AdvisorClient {
    client: Client,
    proxy_url: String,
    retry: RetryConfig,
}

impl AdvisorClient {
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let retry = RetryConfig::new(config.max_attempts, config.initial_backoff_ms, MAX_BACKOFF_MS);
        Self::with_retry_config(&config.proxy_url, retry)
    }

    pub fn with_retry_config(proxy_url: &str, retry: RetryConfig) -> Result<Self, AdvisorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdvisorError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            proxy_url: proxy_url.to_string(),
            retry,
        })
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// Ask the proxy for advice, retrying transient failures with backoff.
    #[tracing::instrument(skip(self, request))]
    pub async fn advise(&self, request: &AdviceRequest) -> Result<String, AdvisorError> {
        let result = with_retry(&self.retry, AdvisorError::retry_decision, || {
            self.request_once(request)
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(RetryError::Permanent(e)) => Err(e),
            Err(RetryError::Exhausted { attempts, last }) => Err(AdvisorError::Exhausted {
                attempts,
                url: self.proxy_url.clone(),
                last: Box::new(last),
            }),
        }
    }

    async fn request_once(&self, request: &AdviceRequest) -> Result<String, AdvisorError> {
        let response = self
            .client
            .post(&self.proxy_url)
            .json(request)
            .send()
            .await
            .map_err(|e| AdvisorError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProxyErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("Proxy server returned status {}", status.as_u16()));
            return Err(AdvisorError::Proxy {
                status: status.as_u16(),
                message,
            });
        }

        let body: AdviceResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Network(e.into_network_error()))?;

        match body.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(AdvisorError::EmptyResponse),
        }
    }
}
