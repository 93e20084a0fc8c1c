//! End-to-end dashboard flows against an in-memory weather API.
//!
//! Time is paused, so debounce windows and slow responses are deterministic.

use async_trait::async_trait;
use parking_lot::Mutex;
use skycast_dashboard::{Dashboard, DashboardSettings, NoticeKind};
use skycast_weather::{
    Coordinates, CurrentConditions, DailyData, FixedPosition, ForecastData, GeolocationError,
    HourlyData, LocationCache, LocationRecord, PositionSource, UnsupportedPosition, WeatherApi,
    WeatherError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn berlin() -> LocationRecord {
    LocationRecord {
        id: 2950159,
        name: "Berlin".into(),
        country: "Germany".into(),
        country_code: "DE".into(),
        admin1: Some("Land Berlin".into()),
        latitude: 52.52,
        longitude: 13.405,
    }
}

fn paris() -> LocationRecord {
    LocationRecord {
        id: 2988507,
        name: "Paris".into(),
        country: "France".into(),
        country_code: "FR".into(),
        admin1: Some("Île-de-France".into()),
        latitude: 48.85,
        longitude: 2.35,
    }
}

fn forecast_for(location: &LocationRecord) -> ForecastData {
    ForecastData {
        latitude: location.latitude,
        longitude: location.longitude,
        current: CurrentConditions {
            temperature_2m: 10.0,
            weather_code: 3,
            ..CurrentConditions::default()
        },
        hourly: HourlyData {
            time: vec![
                "2024-01-01T00:00".into(),
                "2024-01-01T01:00".into(),
                "2024-01-02T00:00".into(),
            ],
            temperature_2m: vec![5.0, 10.0, 0.0],
            relative_humidity_2m: vec![80.0, 81.0, 82.0],
            wind_speed_10m: vec![0.0, 0.0, 0.0],
            precipitation: vec![0.0, 0.0, 0.0],
            weather_code: vec![0, 1, 2],
        },
        daily: DailyData {
            time: vec!["2024-01-01".into(), "2024-01-02".into()],
            temperature_2m_max: vec![10.0, 5.0],
            temperature_2m_min: vec![0.0, -5.0],
            weather_code: vec![3, 0],
            daylight_duration: vec![28000.0, 28100.0],
            rain_sum: vec![0.0, 0.0],
        },
        ..ForecastData::default()
    }
}

#[derive(Default)]
struct FakeApi {
    searches: Mutex<Vec<String>>,
    reverse_calls: AtomicUsize,
    forecasts: Mutex<Vec<String>>,
    /// Forecast requests that fail before one succeeds
    failing_forecasts: AtomicUsize,
    forecast_delays: HashMap<String, Duration>,
    search_delays: HashMap<String, Duration>,
    reverse_delay: Duration,
    search_fails: bool,
    reverse_fails: bool,
}

impl FakeApi {
    fn search_count(&self) -> usize {
        self.searches.lock().len()
    }

    fn forecast_count(&self) -> usize {
        self.forecasts.lock().len()
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationRecord>, WeatherError> {
        self.searches.lock().push(query.to_string());
        if let Some(delay) = self.search_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        if self.search_fails {
            return Err(WeatherError::Upstream {
                status: 500,
                message: "Geocoding API error: 500".into(),
            });
        }
        // First candidate is named after the query so results can be told apart
        let named = LocationRecord {
            name: query.to_string(),
            ..paris()
        };
        Ok(vec![named, berlin()])
    }

    async fn reverse_geocode(&self, _coords: Coordinates) -> Result<LocationRecord, WeatherError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.reverse_delay).await;
        if self.reverse_fails {
            return Err(WeatherError::NotFound(
                "No location found for these coordinates".into(),
            ));
        }
        Ok(berlin())
    }

    async fn forecast(&self, location: &LocationRecord) -> Result<ForecastData, WeatherError> {
        self.forecasts.lock().push(location.name.clone());
        if let Some(delay) = self.forecast_delays.get(&location.name) {
            tokio::time::sleep(*delay).await;
        }

        let failing = self.failing_forecasts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_forecasts.store(failing - 1, Ordering::SeqCst);
            return Err(WeatherError::Upstream {
                status: 503,
                message: "Weather API error: 503".into(),
            });
        }
        Ok(forecast_for(location))
    }
}

fn dashboard(api: &Arc<FakeApi>, position: Arc<dyn PositionSource>, dir: &TempDir) -> Dashboard {
    Dashboard::new(
        Arc::clone(api) as Arc<dyn WeatherApi>,
        position,
        LocationCache::new(dir.path()),
        DashboardSettings::default(),
    )
    .with_today(|| "2024-01-01".to_string())
}

fn near_berlin() -> Arc<dyn PositionSource> {
    Arc::new(FixedPosition(Coordinates::new(52.5201, 13.4049)))
}

#[tokio::test(start_paused = true)]
async fn test_typing_searches_once_after_quiet_period() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    for query in ["a", "ab", "abc"] {
        dashboard.set_query(query);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(api.search_count(), 0);

    dashboard.run_until_idle().await;

    assert_eq!(*api.searches.lock(), vec!["abc".to_string()]);
    let view = dashboard.snapshot();
    assert_eq!(view.state.debounced_query, "abc");
    assert_eq!(view.locations().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_clearing_query_disables_search() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.set_query("ber");
    dashboard.run_until_idle().await;
    assert_eq!(dashboard.snapshot().locations().len(), 2);

    dashboard.set_query("   ");
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert!(view.locations().is_empty());
    assert!(!view.search.is_enabled());
    assert_eq!(api.search_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_query_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    for query in ["berlin", "berli", "berlin"] {
        dashboard.set_query(query);
        dashboard.run_until_idle().await;
    }

    assert_eq!(
        *api.searches.lock(),
        vec!["berlin".to_string(), "berli".to_string()]
    );
    assert_eq!(dashboard.snapshot().locations().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_nearby_cached_location_skips_reverse_geocoding() {
    let dir = TempDir::new().unwrap();
    LocationCache::new(dir.path())
        .write(&berlin(), Coordinates::new(52.52, 13.405))
        .unwrap();

    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, near_berlin(), &dir);
    dashboard.start();
    dashboard.run_until_idle().await;

    assert_eq!(api.reverse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.forecast_count(), 1);

    let view = dashboard.snapshot();
    assert_eq!(view.state.selected_location, Some(berlin()));
    assert!(view.state.should_fetch_weather);
    assert!(!view.state.should_call_reverse_geocoding);
    assert_eq!(view.state.selected_day, "2024-01-01");
    assert!(view.show_weather);
    assert_eq!(view.derived.hourly.as_ref().map(|h| h.time.len()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_uncached_position_is_reverse_geocoded_and_cached() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, near_berlin(), &dir);

    dashboard.start();
    dashboard.run_until_idle().await;

    assert_eq!(api.reverse_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*api.forecasts.lock(), vec!["Berlin".to_string()]);

    let view = dashboard.snapshot();
    assert_eq!(view.state.selected_location, Some(berlin()));
    assert!(view.state.should_fetch_weather);
    assert!(view.show_weather);

    let cached = LocationCache::new(dir.path()).read().unwrap();
    assert_eq!(cached.location, berlin());
    assert_eq!(cached.cached_coords, Coordinates::new(52.5201, 13.4049));
}

#[tokio::test(start_paused = true)]
async fn test_finding_location_notice_while_reverse_geocoding() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        reverse_delay: Duration::from_millis(200),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, near_berlin(), &dir);
    dashboard.start();

    let event = dashboard.next_event().await.unwrap();
    dashboard.handle_event(event);

    let view = dashboard.snapshot();
    assert!(view.reverse_geocode.pending);
    assert_eq!(
        view.notice(NoticeKind::FindingLocation).map(|n| n.message.as_str()),
        Some("Finding your current location...")
    );

    dashboard.run_until_idle().await;
    assert!(dashboard
        .snapshot()
        .notice(NoticeKind::FindingLocation)
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_user_choice_beats_late_reverse_geocode() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        reverse_delay: Duration::from_millis(500),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, near_berlin(), &dir);

    dashboard.start();
    dashboard.select_location(Some(paris()));
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert_eq!(view.state.selected_location, Some(paris()));
    assert_eq!(*api.forecasts.lock(), vec!["Paris".to_string()]);
    // The resolved position is still remembered for next time
    assert_eq!(
        LocationCache::new(dir.path()).read().map(|c| c.location),
        Some(berlin())
    );
}

#[tokio::test(start_paused = true)]
async fn test_geolocation_failure_shows_notice_until_typing() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.start();
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert_eq!(view.geolocation.error, Some(GeolocationError::Unsupported));
    assert!(!view.state.should_call_reverse_geocoding);
    assert_eq!(
        view.notice(NoticeKind::LocationError).map(|n| n.message.as_str()),
        Some("Error finding your location. Please use the search bar.")
    );
    assert_eq!(api.reverse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.forecast_count(), 0);

    dashboard.set_query("par");
    assert!(dashboard
        .snapshot()
        .notice(NoticeKind::LocationError)
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_forecast_is_discarded() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        forecast_delays: HashMap::from([("Berlin".to_string(), Duration::from_millis(500))]),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.select_location(Some(berlin()));
    dashboard.select_location(Some(paris()));
    dashboard.run_until_idle().await;

    assert_eq!(api.forecast_count(), 2);
    let view = dashboard.snapshot();
    assert_eq!(view.state.selected_location, Some(paris()));
    assert_eq!(view.forecast.data.as_ref().map(|f| f.latitude), Some(48.85));
    assert!(view.show_weather);
}

#[tokio::test(start_paused = true)]
async fn test_selecting_location_shows_loading_then_weather() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        forecast_delays: HashMap::from([("Paris".to_string(), Duration::from_millis(100))]),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.select_location(Some(paris()));

    let view = dashboard.snapshot();
    assert!(!view.state.is_initial_load);
    assert!(view.show_loading);
    assert!(!view.show_weather);
    assert!(view.notice(NoticeKind::ForecastLoading).is_some());

    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert!(!view.show_loading);
    assert!(view.show_weather);
    assert_eq!(view.state.selected_day, "2024-01-01");
}

#[tokio::test(start_paused = true)]
async fn test_submit_retries_failed_forecast() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        failing_forecasts: AtomicUsize::new(1),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.select_location(Some(berlin()));
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert!(!view.show_weather);
    assert_eq!(
        view.notice(NoticeKind::ForecastError).map(|n| n.message.as_str()),
        Some("Error loading weather data. Submit again to retry.")
    );

    dashboard.submit();
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert_eq!(api.forecast_count(), 2);
    assert!(view.show_weather);
    assert!(view.notice(NoticeKind::ForecastError).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_submit_without_location_does_nothing() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.submit();

    assert!(dashboard.is_idle());
    assert!(!dashboard.snapshot().state.should_fetch_weather);
    assert_eq!(api.forecast_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unit_toggle_converts_without_refetch() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.select_location(Some(berlin()));
    dashboard.run_until_idle().await;
    let metric = dashboard.snapshot();
    assert_eq!(
        metric.derived.converted.as_ref().map(|f| f.current.temperature_2m),
        Some(10.0)
    );

    dashboard.toggle_imperial(true);
    assert!(dashboard.is_idle());

    let imperial = dashboard.snapshot();
    assert!(imperial.state.enabled);
    assert_eq!(
        imperial.derived.converted.as_ref().map(|f| f.current.temperature_2m),
        Some(50.0)
    );
    assert_eq!(
        imperial.derived.hourly.as_ref().map(|h| h.temperature_2m.clone()),
        Some(vec![41.0, 50.0])
    );
    assert_eq!(api.forecast_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_selecting_day_slices_hourly_series() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi::default());
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.select_location(Some(berlin()));
    dashboard.run_until_idle().await;
    dashboard.select_day("2024-01-02");

    let view = dashboard.snapshot();
    assert_eq!(view.state.selected_day, "2024-01-02");
    assert_eq!(
        view.derived.hourly.as_ref().map(|h| h.time.clone()),
        Some(vec!["2024-01-02T00:00".to_string()])
    );
}

#[tokio::test(start_paused = true)]
async fn test_reverse_geocode_failure_selects_nothing() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        reverse_fails: true,
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, near_berlin(), &dir);

    dashboard.start();
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert_eq!(api.reverse_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        view.reverse_geocode.error,
        Some(WeatherError::NotFound(_))
    ));
    assert_eq!(
        view.notice(NoticeKind::LocationError).map(|n| n.message.as_str()),
        Some("Error finding your location. Please use the search bar.")
    );
    assert!(view.notice(NoticeKind::FindingLocation).is_none());
    assert_eq!(view.state.selected_location, None);
    assert!(!view.state.should_fetch_weather);
    assert!(LocationCache::new(dir.path()).read().is_none());
    assert_eq!(api.forecast_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_shows_error_with_no_results() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        search_fails: true,
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.set_query("ber");
    dashboard.run_until_idle().await;

    let view = dashboard.snapshot();
    assert!(matches!(
        view.search.error,
        Some(WeatherError::Upstream { status: 500, .. })
    ));
    assert!(!view.search.pending);
    assert!(view.locations().is_empty());
    assert_eq!(
        view.notice(NoticeKind::SearchError).map(|n| n.message.as_str()),
        Some("Location search failed. Keep typing to try again.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_search_result_for_old_query_is_dropped() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeApi {
        search_delays: HashMap::from([("slow".to_string(), Duration::from_millis(500))]),
        ..FakeApi::default()
    });
    let mut dashboard = dashboard(&api, Arc::new(UnsupportedPosition), &dir);

    dashboard.set_query("slow");
    let event = dashboard.next_event().await.unwrap();
    dashboard.handle_event(event);
    assert!(dashboard.snapshot().search.pending);

    dashboard.set_query("fast");
    dashboard.run_until_idle().await;

    assert_eq!(
        *api.searches.lock(),
        vec!["slow".to_string(), "fast".to_string()]
    );
    let view = dashboard.snapshot();
    assert_eq!(view.search.key.as_deref(), Some("fast"));
    assert_eq!(
        view.locations().first().map(|l| l.name.as_str()),
        Some("fast")
    );
}
