//! Turns a one-shot position result into a cache hit or a reverse-geocode request.

use crate::cache::LocationCache;
use crate::types::{Coordinates, GeolocationError, LocationRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The cached location was resolved from nearby coordinates; skip the network.
    CacheHit {
        coords: Coordinates,
        location: LocationRecord,
    },
    /// No usable cache entry; the coordinates must be reverse geocoded.
    NeedsReverseGeocode { coords: Coordinates },
    Failed(GeolocationError),
}

pub fn resolve_position(
    result: Result<Coordinates, GeolocationError>,
    cache: &LocationCache,
    threshold: f64,
) -> Resolution {
    let coords = match result {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Geolocation failed: {}", e);
            return Resolution::Failed(e);
        }
    };

    match cache.read() {
        Some(entry) if entry.cached_coords.is_similar_to(&coords, threshold) => {
            tracing::info!("Using cached location: {}", entry.location.name);
            Resolution::CacheHit {
                coords,
                location: entry.location,
            }
        }
        Some(_) => {
            tracing::debug!("Cached location is too far from current position");
            Resolution::NeedsReverseGeocode { coords }
        }
        None => Resolution::NeedsReverseGeocode { coords },
    }
}
