//! Geocoding payloads: Open-Meteo name search and Nominatim reverse lookup.
//! Both are free and need no API key.

use crate::types::{LocationRecord, WeatherError};
use serde::Deserialize;

pub(crate) const NO_LOCATION_FOUND: &str = "No location found for these coordinates";
const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Open-Meteo geocoding search response; `results` is absent when nothing matched.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<LocationRecord>>,
}

impl SearchResponse {
    pub fn into_locations(self) -> Vec<LocationRecord> {
        self.results.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NominatimResponse {
    place_id: Option<u64>,
    lat: Option<String>,
    lon: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl NominatimResponse {
    /// Convert a reverse-geocoding hit into a location record.
    pub fn into_location(self) -> Result<LocationRecord, WeatherError> {
        let addr = self
            .address
            .ok_or_else(|| WeatherError::NotFound(NO_LOCATION_FOUND.to_string()))?;

        let latitude = parse_degrees(self.lat.as_deref(), "lat")?;
        let longitude = parse_degrees(self.lon.as_deref(), "lon")?;

        // Prefer city > town > village > municipality for the place name
        let name = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        let admin1 = addr
            .state
            .filter(|s| !s.is_empty())
            .or(addr.county.filter(|c| !c.is_empty()));

        Ok(LocationRecord {
            id: self.place_id.unwrap_or_default(),
            name,
            country: addr.country.unwrap_or_default(),
            country_code: addr.country_code.unwrap_or_default().to_uppercase(),
            admin1,
            latitude,
            longitude,
        })
    }
}

fn parse_degrees(raw: Option<&str>, field: &str) -> Result<f64, WeatherError> {
    raw.ok_or_else(|| WeatherError::Parse(format!("missing `{field}` in reverse geocode response")))?
        .trim()
        .parse::<f64>()
        .map_err(|e| WeatherError::Parse(format!("invalid `{field}`: {e}")))
}
