//! Maps dashboard failures to skycast_core::AppError for consistent inline messages.

use skycast_core::{AppError, WeatherError as CoreWeatherError};
use skycast_weather::{GeolocationError, WeatherError};

pub fn geolocation_error(e: &GeolocationError) -> AppError {
    AppError::Weather(CoreWeatherError::GeolocationFailed(e.to_string()))
}

pub fn reverse_geocode_error(e: &WeatherError) -> AppError {
    AppError::Weather(CoreWeatherError::LocationNotFound(e.to_string()))
}

pub fn search_error(e: &WeatherError) -> AppError {
    AppError::Weather(CoreWeatherError::SearchFailed(e.to_string()))
}

pub fn forecast_error(e: &WeatherError) -> AppError {
    match e {
        WeatherError::Cancelled => AppError::Weather(CoreWeatherError::ServiceUnavailable),
        other => AppError::Weather(CoreWeatherError::ApiError(other.to_string())),
    }
}

pub fn cache_error(e: &WeatherError) -> AppError {
    AppError::Weather(CoreWeatherError::CacheError(e.to_string()))
}
