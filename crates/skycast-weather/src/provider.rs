//! Data access over HTTP: location search, reverse geocoding and forecasts.

use crate::geocode::{NominatimResponse, SearchResponse};
use crate::types::{Coordinates, ForecastData, LocationRecord, WeatherError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const CURRENT_FIELDS: &[&str] = &[
    "temperature_2m",
    "wind_speed_10m",
    "relative_humidity_2m",
    "rain",
    "apparent_temperature",
    "is_day",
    "weather_code",
    "wind_direction_10m",
    "cloud_cover",
];

const DAILY_FIELDS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "weather_code",
    "daylight_duration",
    "rain_sum",
];

const HOURLY_FIELDS: &[&str] = &[
    "temperature_2m",
    "relative_humidity_2m",
    "wind_speed_10m",
    "precipitation",
    "weather_code",
];

/// The three upstream queries the dashboard depends on.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Candidate locations for a place name; an empty list when nothing matches.
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationRecord>, WeatherError>;

    /// Exactly one location for the coordinates, or `NotFound`.
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<LocationRecord, WeatherError>;

    /// Current, hourly and daily forecast for the location's coordinates.
    async fn forecast(&self, location: &LocationRecord) -> Result<ForecastData, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub geocoding_url: String,
    pub reverse_geocoding_url: String,
    pub forecast_url: String,
    pub user_agent: String,
    pub forecast_days: u8,
    pub search_result_count: u8,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            reverse_geocoding_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            user_agent: format!("Skycast/{}", env!("CARGO_PKG_VERSION")),
            forecast_days: 7,
            search_result_count: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Open-Meteo + Nominatim implementation of [`WeatherApi`].
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    settings: ProviderSettings,
}

impl WeatherProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            settings,
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }
}

/// Map a non-success response to `Upstream`, keeping a short body excerpt.
async fn ensure_success(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, WeatherError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    tracing::warn!("{} returned status {}: {}", context, status, excerpt);

    Err(WeatherError::Upstream {
        status: status.as_u16(),
        message: if excerpt.is_empty() {
            format!("{context} error: {}", status.as_u16())
        } else {
            format!("{context} error: {excerpt}")
        },
    })
}

#[async_trait]
impl WeatherApi for WeatherProvider {
    #[tracing::instrument(skip(self))]
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationRecord>, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let count = self.settings.search_result_count.to_string();
        let response = self
            .client
            .get(&self.settings.geocoding_url)
            .query(&[
                ("name", query),
                ("count", count.as_str()),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        let response = ensure_success(response, "Location API").await?;
        let body: SearchResponse = response.json().await?;
        let locations = body.into_locations();

        tracing::debug!("Search for {:?} returned {} locations", query, locations.len());
        Ok(locations)
    }

    #[tracing::instrument(skip(self))]
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<LocationRecord, WeatherError> {
        let response = self
            .client
            .get(&self.settings.reverse_geocoding_url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header(reqwest::header::USER_AGENT, &self.settings.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en")
            .send()
            .await?;

        let response = ensure_success(response, "Reverse geocoding API").await?;
        let body: NominatimResponse = response.json().await?;
        let location = body.into_location()?;

        tracing::info!("Reverse geocoded to: {}", location.display_name());
        Ok(location)
    }

    #[tracing::instrument(skip(self, location), fields(name = %location.name))]
    async fn forecast(&self, location: &LocationRecord) -> Result<ForecastData, WeatherError> {
        let response = self
            .client
            .get(&self.settings.forecast_url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.join(",")),
                ("hourly", HOURLY_FIELDS.join(",")),
                ("daily", DAILY_FIELDS.join(",")),
                ("forecast_days", self.settings.forecast_days.to_string()),
            ])
            .send()
            .await?;

        let response = ensure_success(response, "Weather API").await?;
        let forecast: ForecastData = response.json().await?;

        tracing::info!(
            "Fetched forecast for {} ({} hourly points)",
            location.name,
            forecast.hourly.time.len()
        );
        Ok(forecast)
    }
}
