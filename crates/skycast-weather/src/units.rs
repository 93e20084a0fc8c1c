//! Metric/imperial conversion for the three unit axes.
//!
//! Forecasts always arrive in metric; every unit here converts from and
//! back to that canonical form.

use serde::{Deserialize, Serialize};

const KMH_PER_MPH: f64 = 1.609;
const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_metric(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    pub fn to_metric(self, value: f64) -> f64 {
        match self {
            Self::Celsius => value,
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kmh,
    Mph,
}

impl WindSpeedUnit {
    pub fn from_metric(self, kmh: f64) -> f64 {
        match self {
            Self::Kmh => kmh,
            Self::Mph => kmh / KMH_PER_MPH,
        }
    }

    pub fn to_metric(self, value: f64) -> f64 {
        match self {
            Self::Kmh => value,
            Self::Mph => value * KMH_PER_MPH,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Kmh => "km/h",
            Self::Mph => "mph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationUnit {
    #[default]
    Mm,
    Inches,
}

impl PrecipitationUnit {
    pub fn from_metric(self, mm: f64) -> f64 {
        match self {
            Self::Mm => mm,
            Self::Inches => mm / MM_PER_INCH,
        }
    }

    pub fn to_metric(self, value: f64) -> f64 {
        match self {
            Self::Mm => value,
            Self::Inches => value * MM_PER_INCH,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Inches => "in",
        }
    }
}

/// One axis set to one unit, for individual unit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSelection {
    Temperature(TemperatureUnit),
    Wind(WindSpeedUnit),
    Precipitation(PrecipitationUnit),
}

/// Three independently selectable unit axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnitPreferences {
    pub temperature: TemperatureUnit,
    pub wind: WindSpeedUnit,
    pub precipitation: PrecipitationUnit,
}

impl UnitPreferences {
    pub fn metric() -> Self {
        Self::default()
    }

    pub fn imperial() -> Self {
        Self {
            temperature: TemperatureUnit::Fahrenheit,
            wind: WindSpeedUnit::Mph,
            precipitation: PrecipitationUnit::Inches,
        }
    }

    /// All three axes for the given toggle position.
    pub fn for_toggle(imperial: bool) -> Self {
        if imperial {
            Self::imperial()
        } else {
            Self::metric()
        }
    }

    /// Returns a copy with exactly one axis replaced.
    pub fn apply(self, selection: UnitSelection) -> Self {
        match selection {
            UnitSelection::Temperature(temperature) => Self {
                temperature,
                ..self
            },
            UnitSelection::Wind(wind) => Self { wind, ..self },
            UnitSelection::Precipitation(precipitation) => Self {
                precipitation,
                ..self
            },
        }
    }

    pub fn is_all_imperial(&self) -> bool {
        *self == Self::imperial()
    }
}
