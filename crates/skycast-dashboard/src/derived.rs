//! Memoized derived data, keyed by input identity.

use std::sync::Arc;

use skycast_weather::{convert_forecast, hourly_slice, ForecastData, HourlySlice, UnitPreferences};

/// Converted forecast and the hourly slice for the selected day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedData {
    pub converted: Option<Arc<ForecastData>>,
    pub hourly: Option<Arc<HourlySlice>>,
}

struct ConvertedEntry {
    source: Arc<ForecastData>,
    units: UnitPreferences,
    output: Arc<ForecastData>,
}

struct SliceEntry {
    converted: Arc<ForecastData>,
    day: String,
    output: Arc<HourlySlice>,
}

/// Remembers the last conversion and the last slice; recomputes when an input changes.
#[derive(Default)]
pub struct DerivedCache {
    converted: Option<ConvertedEntry>,
    slice: Option<SliceEntry>,
}

impl std::fmt::Debug for DerivedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedCache")
            .field("converted", &self.converted.is_some())
            .field("slice", &self.slice.as_ref().map(|s| s.day.as_str()))
            .finish()
    }
}

impl DerivedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive(
        &mut self,
        source: Option<&Arc<ForecastData>>,
        units: UnitPreferences,
        day: &str,
    ) -> DerivedData {
        let Some(source) = source else {
            return DerivedData::default();
        };

        let converted = self.converted(source, units);
        let hourly = self.hourly(&converted, day);

        DerivedData {
            converted: Some(converted),
            hourly,
        }
    }

    fn converted(&mut self, source: &Arc<ForecastData>, units: UnitPreferences) -> Arc<ForecastData> {
        if let Some(entry) = &self.converted {
            if Arc::ptr_eq(&entry.source, source) && entry.units == units {
                return Arc::clone(&entry.output);
            }
        }

        tracing::debug!("Converting forecast to {:?}", units);
        let output = Arc::new(convert_forecast(source, &units));
        self.converted = Some(ConvertedEntry {
            source: Arc::clone(source),
            units,
            output: Arc::clone(&output),
        });
        output
    }

    fn hourly(&mut self, converted: &Arc<ForecastData>, day: &str) -> Option<Arc<HourlySlice>> {
        if let Some(entry) = &self.slice {
            if Arc::ptr_eq(&entry.converted, converted) && entry.day == day {
                return Some(Arc::clone(&entry.output));
            }
        }

        let output = Arc::new(hourly_slice(Some(converted.as_ref()), day)?);
        self.slice = Some(SliceEntry {
            converted: Arc::clone(converted),
            day: day.to_string(),
            output: Arc::clone(&output),
        });
        Some(output)
    }
}
