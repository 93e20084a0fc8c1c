//! Weather domain for Skycast
//!
//! Location search, reverse geocoding and forecasts via Open-Meteo and
//! Nominatim, device position resolution against a single-slot location
//! cache, unit conversion and the derived forecast views.

pub mod cache;
pub mod coords;
pub mod geocode;
pub mod location;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod resolver;
pub mod types;
pub mod units;

pub use cache::{CachedLocation, LocationCache};
pub use coords::{are_coords_similar, CoordKey, DEFAULT_SIMILARITY_THRESHOLD};
pub use location::{FixedPosition, PositionSource, UnsupportedPosition};
pub use pipeline::{convert_forecast, filter_hourly_for_day, hourly_slice, HourlySlice};
pub use provider::{ProviderSettings, WeatherApi, WeatherProvider};
pub use query::{QueryClient, QueryState};
pub use resolver::{resolve_position, Resolution};
pub use types::*;
pub use units::{PrecipitationUnit, TemperatureUnit, UnitPreferences, UnitSelection, WindSpeedUnit};
