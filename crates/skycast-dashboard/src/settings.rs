//! Bridges configuration into the dashboard and its collaborators.

use std::sync::Arc;
use std::time::Duration;

use skycast_core::WeatherConfig;
use skycast_weather::{
    Coordinates, FixedPosition, PositionSource, ProviderSettings, UnsupportedPosition,
    DEFAULT_SIMILARITY_THRESHOLD,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    /// Quiet period before a typed query is searched
    pub search_debounce: Duration,
    /// Max per-axis degree difference for reusing the cached location
    pub similarity_threshold: f64,
    /// Initial position of the imperial toggle
    pub imperial: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            imperial: false,
        }
    }
}

impl From<&WeatherConfig> for DashboardSettings {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            search_debounce: Duration::from_millis(config.search_debounce_ms),
            similarity_threshold: config.similar_coords_threshold,
            imperial: config.imperial,
        }
    }
}

pub fn provider_settings(config: &WeatherConfig) -> ProviderSettings {
    ProviderSettings {
        geocoding_url: config.geocoding_url.clone(),
        reverse_geocoding_url: config.reverse_geocoding_url.clone(),
        forecast_url: config.forecast_url.clone(),
        user_agent: config.user_agent.clone(),
        forecast_days: config.forecast_days,
        search_result_count: config.search_result_count,
        timeout: Duration::from_secs(config.request_timeout_secs),
    }
}

/// Configured fixed position, or an unsupported source when none is set.
pub fn position_source(config: &WeatherConfig) -> Arc<dyn PositionSource> {
    match config.position {
        Some(p) => Arc::new(FixedPosition(Coordinates::new(p.latitude, p.longitude))),
        None => {
            tracing::info!("No position configured; location must be searched");
            Arc::new(UnsupportedPosition)
        }
    }
}
