//! Single-slot persistent cache of the last reverse-geocoded location.

use crate::types::{Coordinates, LocationRecord, WeatherError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = "location_cache.json";

/// The persisted record: a location plus the coordinates it was resolved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    pub location: LocationRecord,
    #[serde(rename = "cachedCoords")]
    pub cached_coords: Coordinates,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocationCache {
    cache_path: PathBuf,
}

impl LocationCache {
    /// Cache stored as `location_cache.json` inside `config_dir`.
    pub fn new(config_dir: &Path) -> Self {
        Self {
            cache_path: config_dir.join(CACHE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Read the cached entry. Missing or malformed data is a cache miss.
    pub fn read(&self) -> Option<CachedLocation> {
        let content = match std::fs::read_to_string(&self.cache_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cached location at {}", self.cache_path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read location cache: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CachedLocation>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring malformed location cache: {}", e);
                None
            }
        }
    }

    /// Overwrite the cached entry, stamping the current time.
    pub fn write(
        &self,
        location: &LocationRecord,
        coords: Coordinates,
    ) -> Result<CachedLocation, WeatherError> {
        let entry = CachedLocation {
            location: location.clone(),
            cached_coords: coords,
            timestamp: Utc::now(),
        };

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WeatherError::Cache(e.to_string()))?;
        }

        let json =
            serde_json::to_string_pretty(&entry).map_err(|e| WeatherError::Cache(e.to_string()))?;

        // Write to a sibling temp file first so a crash never leaves a torn entry
        let tmp_path = self.cache_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| WeatherError::Cache(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.cache_path)
            .map_err(|e| WeatherError::Cache(e.to_string()))?;

        tracing::debug!("Cached location {} at {}", location.name, self.cache_path.display());
        Ok(entry)
    }
}
