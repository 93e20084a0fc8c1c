//! Dashboard state and its pure transition function.

use skycast_weather::{Coordinates, LocationRecord, UnitPreferences, UnitSelection};

/// Canonical dashboard state. Derived data is never stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherState {
    pub selected_location: Option<LocationRecord>,
    /// `YYYY-MM-DD`, empty when no day is selected
    pub selected_day: String,
    pub query: String,
    pub debounced_query: String,
    /// Imperial toggle; independent of the per-axis units
    pub enabled: bool,
    pub units: UnitPreferences,
    pub should_fetch_weather: bool,
    pub should_call_reverse_geocoding: bool,
    pub is_initial_load: bool,
    pub coords: Option<Coordinates>,
}

impl Default for WeatherState {
    fn default() -> Self {
        Self {
            selected_location: None,
            selected_day: String::new(),
            query: String::new(),
            debounced_query: String::new(),
            enabled: false,
            units: UnitPreferences::metric(),
            should_fetch_weather: false,
            should_call_reverse_geocoding: false,
            is_initial_load: true,
            coords: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherAction {
    SetLocation(Option<LocationRecord>),
    SetDay(String),
    SetQuery(String),
    SetDebouncedQuery(String),
    SetUnitsToggle(bool),
    SetUnitCategory(UnitSelection),
    SetFetchWeather(bool),
    SetReverseGeocoding(bool),
    SetIsInitialLoad(bool),
    SetCoords(Option<Coordinates>),
}

/// Apply one action. Total and free of side effects.
pub fn reduce(state: &WeatherState, action: WeatherAction) -> WeatherState {
    let mut next = state.clone();
    match action {
        WeatherAction::SetLocation(location) => {
            next.selected_location = location;
            next.selected_day.clear();
        }
        WeatherAction::SetDay(day) => next.selected_day = day,
        WeatherAction::SetQuery(query) => next.query = query,
        WeatherAction::SetDebouncedQuery(query) => next.debounced_query = query,
        WeatherAction::SetUnitsToggle(imperial) => {
            next.enabled = imperial;
            next.units = UnitPreferences::for_toggle(imperial);
        }
        WeatherAction::SetUnitCategory(selection) => next.units = next.units.apply(selection),
        WeatherAction::SetFetchWeather(fetch) => next.should_fetch_weather = fetch,
        WeatherAction::SetReverseGeocoding(call) => next.should_call_reverse_geocoding = call,
        // Initial load only ever ends; a fresh state is the only way back
        WeatherAction::SetIsInitialLoad(initial) => {
            next.is_initial_load = state.is_initial_load && initial;
        }
        WeatherAction::SetCoords(coords) => next.coords = coords,
    }
    next
}

impl WeatherState {
    /// Location whose forecast should be loaded, if any.
    pub fn forecast_target(&self) -> Option<&LocationRecord> {
        let location = self.selected_location.as_ref()?;
        (self.should_fetch_weather || self.is_initial_load).then_some(location)
    }

    /// Coordinates to reverse geocode, if any.
    pub fn reverse_geocode_target(&self) -> Option<Coordinates> {
        if self.should_call_reverse_geocoding {
            self.coords
        } else {
            None
        }
    }

    /// Trimmed debounced query; `None` when blank.
    pub fn search_target(&self) -> Option<&str> {
        let query = self.debounced_query.trim();
        (!query.is_empty()).then_some(query)
    }

    /// Whether forecast output (data, loading, errors) is shown at all.
    pub fn forecast_visible(&self) -> bool {
        self.should_fetch_weather || self.is_initial_load
    }
}
