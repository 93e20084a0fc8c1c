//! Derived forecast data: unit conversion and per-day hourly slices.
//!
//! Both functions are pure and always start from the metric payload, so
//! converting twice with the same preferences yields the same result.

use crate::types::{ForecastData, HourlyData};
use crate::units::UnitPreferences;

/// Hourly arrays restricted to one day; same shape as [`HourlyData`].
pub type HourlySlice = HourlyData;

/// Convert temperature, wind and precipitation fields to `units`.
///
/// Every other field passes through unchanged.
pub fn convert_forecast(forecast: &ForecastData, units: &UnitPreferences) -> ForecastData {
    let temp = |v: f64| units.temperature.from_metric(v);
    let wind = |v: f64| units.wind.from_metric(v);
    let precip = |v: f64| units.precipitation.from_metric(v);

    let mut converted = forecast.clone();

    let current = &mut converted.current;
    current.temperature_2m = temp(current.temperature_2m);
    current.apparent_temperature = temp(current.apparent_temperature);
    current.wind_speed_10m = wind(current.wind_speed_10m);
    current.rain = precip(current.rain);

    let hourly = &mut converted.hourly;
    map_in_place(&mut hourly.temperature_2m, temp);
    map_in_place(&mut hourly.wind_speed_10m, wind);
    map_in_place(&mut hourly.precipitation, precip);

    let daily = &mut converted.daily;
    map_in_place(&mut daily.temperature_2m_max, temp);
    map_in_place(&mut daily.temperature_2m_min, temp);

    relabel(&mut converted, units);
    converted
}

fn map_in_place(values: &mut [f64], f: impl Fn(f64) -> f64) {
    for v in values.iter_mut() {
        *v = f(*v);
    }
}

/// Keep the `*_units` labels truthful after conversion.
fn relabel(forecast: &mut ForecastData, units: &UnitPreferences) {
    let temperature = units.temperature.symbol();
    let wind = units.wind.symbol();
    let precipitation = units.precipitation.symbol();

    let set = |labels: &mut crate::types::UnitLabels, field: &str, symbol: &str| {
        if let Some(label) = labels.get_mut(field) {
            *label = symbol.to_string();
        }
    };

    set(&mut forecast.current_units, "temperature_2m", temperature);
    set(&mut forecast.current_units, "apparent_temperature", temperature);
    set(&mut forecast.current_units, "wind_speed_10m", wind);
    set(&mut forecast.current_units, "rain", precipitation);
    set(&mut forecast.hourly_units, "temperature_2m", temperature);
    set(&mut forecast.hourly_units, "wind_speed_10m", wind);
    set(&mut forecast.hourly_units, "precipitation", precipitation);
    set(&mut forecast.daily_units, "temperature_2m_max", temperature);
    set(&mut forecast.daily_units, "temperature_2m_min", temperature);
}

/// Hourly entries whose timestamp contains `day` (`YYYY-MM-DD`), in source order.
///
/// No match gives empty arrays, never `None`; callers decide about a missing day.
pub fn filter_hourly_for_day(hourly: &HourlyData, day: &str) -> HourlySlice {
    let indices: Vec<usize> = hourly
        .time
        .iter()
        .enumerate()
        .filter(|(_, time)| time.contains(day))
        .map(|(i, _)| i)
        .collect();

    fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
        indices.iter().filter_map(|&i| values.get(i).cloned()).collect()
    }

    HourlySlice {
        time: pick(&hourly.time, &indices),
        temperature_2m: pick(&hourly.temperature_2m, &indices),
        relative_humidity_2m: pick(&hourly.relative_humidity_2m, &indices),
        wind_speed_10m: pick(&hourly.wind_speed_10m, &indices),
        precipitation: pick(&hourly.precipitation, &indices),
        weather_code: pick(&hourly.weather_code, &indices),
    }
}

/// Filtered slice for a converted forecast, or `None` without data or a selected day.
pub fn hourly_slice(forecast: Option<&ForecastData>, day: &str) -> Option<HourlySlice> {
    let forecast = forecast?;
    if day.is_empty() {
        return None;
    }
    Some(filter_hourly_for_day(&forecast.hourly, day))
}
