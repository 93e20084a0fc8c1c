//! Weather dashboard controller
//!
//! Owns the dashboard state, schedules its side effects (position lookup,
//! debounced search, reverse geocoding, forecast loading) and exposes a
//! snapshot with the derived views for any presentation layer.

pub mod controller;
pub mod debounce;
pub mod derived;
pub mod error_mapping;
pub mod settings;
pub mod state;

pub use controller::{
    Dashboard, DashboardEvent, DashboardView, GeolocationStatus, Notice, NoticeKind,
};
pub use debounce::Debouncer;
pub use derived::{DerivedCache, DerivedData};
pub use settings::{position_source, provider_settings, DashboardSettings};
pub use state::{reduce, WeatherAction, WeatherState};
