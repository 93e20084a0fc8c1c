//! Effect scheduling around the pure reducer.
//!
//! User intents and async results both become reducer actions. After every
//! change the controller re-derives which queries the state wants and
//! (re)issues them. Every async effect runs on its own task and reports back
//! through one event channel; results are bound through the key the state
//! wants *now*, so superseded results are dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use skycast_core::AppError;
use skycast_weather::{
    resolve_position, CoordKey, Coordinates, ForecastData, GeolocationError, LocationCache,
    LocationRecord, PositionSource, QueryClient, QueryState, Resolution, UnitSelection,
    WeatherApi, WeatherError,
};
use tokio::sync::mpsc;

use crate::debounce::Debouncer;
use crate::derived::{DerivedCache, DerivedData};
use crate::error_mapping;
use crate::settings::DashboardSettings;
use crate::state::{reduce, WeatherAction, WeatherState};

/// Upper bound on reaction passes after one change; the reactions settle in two.
const MAX_RECONCILE_PASSES: usize = 8;

pub type SearchQuery = QueryState<String, Vec<LocationRecord>>;
pub type ReverseGeocodeQuery = QueryState<CoordKey, LocationRecord>;
pub type ForecastQuery = QueryState<CoordKey, Arc<ForecastData>>;

/// Results reported back by asynchronous effects.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Position(Result<Coordinates, GeolocationError>),
    DebouncedQuery(String),
    SearchDone {
        query: String,
        result: Result<Vec<LocationRecord>, WeatherError>,
    },
    ReverseGeocodeDone {
        key: CoordKey,
        result: Result<LocationRecord, WeatherError>,
    },
    ForecastDone {
        key: CoordKey,
        result: Result<Arc<ForecastData>, WeatherError>,
    },
}

/// One-shot device position status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeolocationStatus {
    pub pending: bool,
    pub error: Option<GeolocationError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    FindingLocation,
    LocationError,
    SearchError,
    ForecastLoading,
    ForecastError,
}

/// Inline message for one background operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub detail: Option<String>,
}

impl Notice {
    fn info(kind: NoticeKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            detail: None,
        }
    }

    fn from_error(kind: NoticeKind, error: AppError) -> Self {
        Self {
            kind,
            message: error.user_message().to_string(),
            detail: Some(error.to_string()),
        }
    }
}

/// Read-only view of everything a presentation layer needs.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub state: WeatherState,
    pub geolocation: GeolocationStatus,
    pub search: SearchQuery,
    pub reverse_geocode: ReverseGeocodeQuery,
    pub forecast: ForecastQuery,
    pub derived: DerivedData,
    pub show_weather: bool,
    pub show_loading: bool,
    pub notices: Vec<Notice>,
}

impl DashboardView {
    /// Search candidates; empty on failure or while disabled.
    pub fn locations(&self) -> &[LocationRecord] {
        self.search.data.as_deref().unwrap_or_default()
    }

    pub fn notice(&self, kind: NoticeKind) -> Option<&Notice> {
        self.notices.iter().find(|n| n.kind == kind)
    }
}

type Clock = Arc<dyn Fn() -> String + Send + Sync>;

fn local_today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

pub struct Dashboard {
    state: WeatherState,
    settings: DashboardSettings,
    api: Arc<dyn WeatherApi>,
    position_source: Arc<dyn PositionSource>,
    cache: LocationCache,
    tx: mpsc::UnboundedSender<DashboardEvent>,
    rx: mpsc::UnboundedReceiver<DashboardEvent>,
    debouncer: Debouncer,
    /// Query value whose debounce timer is still running
    pending_debounce: Option<String>,
    /// Spawned effects that have not reported back yet
    outstanding: usize,
    started: bool,
    geolocation: GeolocationStatus,
    search: SearchQuery,
    reverse_geocode: ReverseGeocodeQuery,
    forecast: ForecastQuery,
    search_client: QueryClient<String, Vec<LocationRecord>>,
    reverse_client: QueryClient<CoordKey, LocationRecord>,
    forecast_client: QueryClient<CoordKey, Arc<ForecastData>>,
    derived: Mutex<DerivedCache>,
    today: Clock,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("state", &self.state)
            .field("outstanding", &self.outstanding)
            .field("pending_debounce", &self.pending_debounce)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        position_source: Arc<dyn PositionSource>,
        cache: LocationCache,
        settings: DashboardSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = WeatherState::default();
        if settings.imperial {
            state = reduce(&state, WeatherAction::SetUnitsToggle(true));
        }

        Self {
            state,
            debouncer: Debouncer::new(settings.search_debounce),
            settings,
            api,
            position_source,
            cache,
            tx,
            rx,
            pending_debounce: None,
            outstanding: 0,
            started: false,
            geolocation: GeolocationStatus::default(),
            search: QueryState::default(),
            reverse_geocode: QueryState::default(),
            forecast: QueryState::default(),
            search_client: QueryClient::new(),
            reverse_client: QueryClient::new(),
            forecast_client: QueryClient::new(),
            derived: Mutex::new(DerivedCache::new()),
            today: Arc::new(local_today),
        }
    }

    /// Replace the source of "today" (`YYYY-MM-DD`), used for the default day.
    pub fn with_today<F>(mut self, today: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.today = Arc::new(today);
        self
    }

    /// Acquire the device position once. Later calls do nothing.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.geolocation.pending = true;

        let source = Arc::clone(&self.position_source);
        self.spawn_effect(async move { DashboardEvent::Position(source.current_position().await) });
    }

    /// Apply an action and run the reactions it causes.
    pub fn dispatch(&mut self, action: WeatherAction) {
        self.apply(action);
        self.reconcile();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        self.apply(WeatherAction::SetQuery(query.clone()));

        let tx = self.tx.clone();
        let debounced = query.clone();
        self.debouncer.schedule(move || {
            let _ = tx.send(DashboardEvent::DebouncedQuery(debounced));
        });
        self.pending_debounce = Some(query);

        self.reconcile();
    }

    /// The user picked a location (or cleared the selection).
    pub fn select_location(&mut self, location: Option<LocationRecord>) {
        self.apply(WeatherAction::SetLocation(location));
        self.apply(WeatherAction::SetFetchWeather(true));
        self.apply(WeatherAction::SetIsInitialLoad(false));
        self.reconcile();
    }

    /// Form submission; also retries a failed forecast for the current location.
    pub fn submit(&mut self) {
        if self.state.selected_location.is_none() {
            return;
        }
        self.apply(WeatherAction::SetFetchWeather(true));
        self.apply(WeatherAction::SetIsInitialLoad(false));
        self.reconcile();

        if self.forecast.error.is_some() && !self.forecast.pending {
            if let Some(location) = self.state.forecast_target().cloned() {
                tracing::info!("Retrying forecast for {}", location.name);
                self.start_forecast(location);
                self.reconcile();
            }
        }
    }

    pub fn select_day(&mut self, day: impl Into<String>) {
        self.dispatch(WeatherAction::SetDay(day.into()));
    }

    pub fn toggle_imperial(&mut self, imperial: bool) {
        self.dispatch(WeatherAction::SetUnitsToggle(imperial));
    }

    pub fn select_unit(&mut self, selection: UnitSelection) {
        self.dispatch(WeatherAction::SetUnitCategory(selection));
    }

    /// True when no effect is running and no debounce timer is armed.
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0 && self.pending_debounce.is_none()
    }

    /// Wait for the next effect result without applying it.
    pub async fn next_event(&mut self) -> Option<DashboardEvent> {
        self.rx.recv().await
    }

    /// Process events until every effect has reported back.
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            match self.rx.recv().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Apply one effect result.
    pub fn handle_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Position(result) => {
                self.finish_effect();
                self.on_position(result);
            }
            DashboardEvent::DebouncedQuery(query) => {
                if self.pending_debounce.as_deref() == Some(query.as_str()) {
                    self.pending_debounce = None;
                }
                self.apply(WeatherAction::SetDebouncedQuery(query));
            }
            DashboardEvent::SearchDone { query, result } => {
                self.finish_effect();
                if let Err(e) = &result {
                    tracing::warn!("Location search for {:?} failed: {}", query, e);
                }
                if !self.search.resolve(&query, result) {
                    tracing::debug!("Discarding search results for superseded query {:?}", query);
                }
            }
            DashboardEvent::ReverseGeocodeDone { key, result } => {
                self.finish_effect();
                if self.reverse_geocode.is_current(&key) {
                    self.on_reverse_geocoded(key, result);
                } else {
                    tracing::debug!("Discarding reverse geocode for superseded coordinates");
                }
            }
            DashboardEvent::ForecastDone { key, result } => {
                self.finish_effect();
                if let Err(e) = &result {
                    tracing::warn!("Forecast fetch failed: {}", e);
                }
                if !self.forecast.resolve(&key, result) {
                    tracing::debug!("Discarding forecast for superseded location");
                }
            }
        }
        self.reconcile();
    }

    /// Current state, query statuses, derived data and inline notices.
    pub fn snapshot(&self) -> DashboardView {
        let state = &self.state;
        let derived = self.derived.lock().derive(
            self.forecast.data.as_ref(),
            state.units,
            &state.selected_day,
        );

        let has_location = state.selected_location.is_some();
        let show_weather = state.forecast_visible() && has_location && derived.converted.is_some();
        let show_loading = state.forecast_visible() && self.forecast.pending && has_location;

        let mut notices = Vec::new();
        let no_query = state.query.is_empty();

        if no_query
            && (self.reverse_geocode.pending || self.geolocation.pending)
            && state.should_call_reverse_geocoding
        {
            notices.push(Notice::info(
                NoticeKind::FindingLocation,
                "Finding your current location...",
            ));
        }

        if no_query {
            let location_error = self
                .reverse_geocode
                .error
                .as_ref()
                .map(error_mapping::reverse_geocode_error)
                .or_else(|| {
                    self.geolocation
                        .error
                        .as_ref()
                        .map(error_mapping::geolocation_error)
                });
            if let Some(error) = location_error {
                notices.push(Notice::from_error(NoticeKind::LocationError, error));
            }
        }

        if let Some(e) = &self.search.error {
            notices.push(Notice::from_error(
                NoticeKind::SearchError,
                error_mapping::search_error(e),
            ));
        }

        if show_loading {
            notices.push(Notice::info(NoticeKind::ForecastLoading, "Loading weather data..."));
        }

        if state.forecast_visible() {
            if let Some(e) = &self.forecast.error {
                notices.push(Notice::from_error(
                    NoticeKind::ForecastError,
                    error_mapping::forecast_error(e),
                ));
            }
        }

        DashboardView {
            state: state.clone(),
            geolocation: self.geolocation.clone(),
            search: self.search.clone(),
            reverse_geocode: self.reverse_geocode.clone(),
            forecast: self.forecast.clone(),
            derived,
            show_weather,
            show_loading,
            notices,
        }
    }

    fn apply(&mut self, action: WeatherAction) {
        tracing::trace!("Applying {:?}", action);
        self.state = reduce(&self.state, action);
    }

    fn on_position(&mut self, result: Result<Coordinates, GeolocationError>) {
        self.geolocation.pending = false;

        match resolve_position(result, &self.cache, self.settings.similarity_threshold) {
            Resolution::CacheHit { coords, location } => {
                self.apply(WeatherAction::SetCoords(Some(coords)));
                // A location the user already chose wins over a late cache hit
                if self.state.selected_location.is_none() {
                    self.apply(WeatherAction::SetLocation(Some(location)));
                }
                self.apply(WeatherAction::SetReverseGeocoding(false));
            }
            Resolution::NeedsReverseGeocode { coords } => {
                self.apply(WeatherAction::SetCoords(Some(coords)));
                self.apply(WeatherAction::SetReverseGeocoding(true));
            }
            Resolution::Failed(e) => {
                self.geolocation.error = Some(e);
                self.apply(WeatherAction::SetReverseGeocoding(false));
            }
        }
    }

    fn on_reverse_geocoded(&mut self, key: CoordKey, result: Result<LocationRecord, WeatherError>) {
        let location = match result {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                self.reverse_geocode.resolve(&key, Err(e));
                return;
            }
        };
        self.reverse_geocode.resolve(&key, Ok(location.clone()));

        if self.state.coords.is_some() {
            if let Err(e) = self.cache.write(&location, key.coordinates()) {
                let err = error_mapping::cache_error(&e);
                tracing::warn!("Failed to cache location: {}", err);
            }
        }

        if self.state.selected_location.is_none() {
            tracing::info!("Using current location: {}", location.display_name());
            self.apply(WeatherAction::SetLocation(Some(location)));
            self.apply(WeatherAction::SetFetchWeather(true));
        }
    }

    /// Run state-driven reactions and sync queries until nothing changes.
    fn reconcile(&mut self) {
        for _ in 0..MAX_RECONCILE_PASSES {
            let before = self.state.clone();

            // A location selected during initial load (cache hit) fetches on its own
            if self.state.selected_location.is_some()
                && self.state.is_initial_load
                && !self.state.should_fetch_weather
            {
                self.apply(WeatherAction::SetFetchWeather(true));
            }

            // Default to today once forecast data is available
            if self.forecast.data.is_some() && self.state.selected_day.is_empty() {
                let today = (self.today)();
                self.apply(WeatherAction::SetDay(today));
            }

            self.sync_queries();

            if self.state == before {
                return;
            }
        }
        tracing::warn!("Dashboard reactions did not settle");
    }

    fn sync_queries(&mut self) {
        match self.state.search_target().map(str::to_string) {
            Some(query) if !self.search.is_current(&query) => self.start_search(query),
            Some(_) => {}
            None if self.search.is_enabled() => self.search.disable(),
            None => {}
        }

        match self.state.reverse_geocode_target() {
            Some(coords) if !self.reverse_geocode.is_current(&CoordKey::from(coords)) => {
                self.start_reverse_geocode(coords)
            }
            Some(_) => {}
            None if self.reverse_geocode.is_enabled() => self.reverse_geocode.disable(),
            None => {}
        }

        match self.state.forecast_target().cloned() {
            Some(location) if !self.forecast.is_current(&forecast_key(&location)) => {
                self.start_forecast(location)
            }
            Some(_) => {}
            None if self.forecast.is_enabled() => self.forecast.disable(),
            None => {}
        }
    }

    fn start_search(&mut self, query: String) {
        self.search.start(query.clone());
        if let Some(results) = self.search_client.peek(&query) {
            self.search.resolve(&query, Ok(results));
            return;
        }

        let client = self.search_client.clone();
        let api = Arc::clone(&self.api);
        self.spawn_effect(async move {
            let q = query.clone();
            let result = client
                .fetch(query.clone(), move || async move { api.search_locations(&q).await })
                .await;
            DashboardEvent::SearchDone { query, result }
        });
    }

    fn start_reverse_geocode(&mut self, coords: Coordinates) {
        let key = CoordKey::from(coords);
        self.reverse_geocode.start(key);
        if let Some(location) = self.reverse_client.peek(&key) {
            self.on_reverse_geocoded(key, Ok(location));
            return;
        }

        let client = self.reverse_client.clone();
        let api = Arc::clone(&self.api);
        self.spawn_effect(async move {
            let result = client
                .fetch(key, move || async move { api.reverse_geocode(coords).await })
                .await;
            DashboardEvent::ReverseGeocodeDone { key, result }
        });
    }

    fn start_forecast(&mut self, location: LocationRecord) {
        let key = forecast_key(&location);
        self.forecast.start(key);
        if let Some(forecast) = self.forecast_client.peek(&key) {
            self.forecast.resolve(&key, Ok(forecast));
            return;
        }

        let client = self.forecast_client.clone();
        let api = Arc::clone(&self.api);
        self.spawn_effect(async move {
            let result = client
                .fetch(key, move || async move {
                    api.forecast(&location).await.map(Arc::new)
                })
                .await;
            DashboardEvent::ForecastDone { key, result }
        });
    }

    fn spawn_effect<F>(&mut self, effect: F)
    where
        F: std::future::Future<Output = DashboardEvent> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = effect.await;
            let _ = tx.send(event);
        });
    }

    fn finish_effect(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

/// Forecasts are keyed by coordinates, not by place identity.
fn forecast_key(location: &LocationRecord) -> CoordKey {
    CoordKey::from(location.coordinates())
}
