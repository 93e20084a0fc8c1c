use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR_NAME: &str = "skycast";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Forecast, geocoding and location settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// AI advisor proxy settings
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

/// Fixed device position, used where no platform location service exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Days of forecast requested from the upstream API
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Quiet period before a typed search query is sent
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    /// Max per-axis degree difference for reusing the cached location
    #[serde(default = "default_similar_coords_threshold")]
    pub similar_coords_threshold: f64,

    /// Number of candidates returned by location search
    #[serde(default = "default_search_result_count")]
    pub search_result_count: u8,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Start with the imperial toggle enabled
    #[serde(default)]
    pub imperial: bool,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_reverse_geocoding_url")]
    pub reverse_geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Sent to Nominatim, which requires an identifying agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Device position; geolocation is reported unsupported when absent
    #[serde(default)]
    pub position: Option<PositionConfig>,
}

fn default_forecast_days() -> u8 {
    7
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_similar_coords_threshold() -> f64 {
    0.01
}

fn default_search_result_count() -> u8 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_reverse_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_user_agent() -> String {
    format!("Skycast/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_days: default_forecast_days(),
            search_debounce_ms: default_search_debounce_ms(),
            similar_coords_threshold: default_similar_coords_threshold(),
            search_result_count: default_search_result_count(),
            request_timeout_secs: default_request_timeout_secs(),
            imperial: false,
            geocoding_url: default_geocoding_url(),
            reverse_geocoding_url: default_reverse_geocoding_url(),
            forecast_url: default_forecast_url(),
            user_agent: default_user_agent(),
            position: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Endpoint of the advice proxy (holds the model API key server-side)
    #[serde(default = "default_advisor_proxy_url")]
    pub proxy_url: String,

    #[serde(default = "default_advisor_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on every further attempt
    #[serde(default = "default_advisor_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_advisor_proxy_url() -> String {
    "http://localhost:3000/api/advice".to_string()
}

fn default_advisor_max_attempts() -> u32 {
    3
}

fn default_advisor_initial_backoff_ms() -> u64 {
    1000
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_advisor_proxy_url(),
            max_attempts: default_advisor_max_attempts(),
            initial_backoff_ms: default_advisor_initial_backoff_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.geocoding_url, "weather.geocoding_url", &mut result);
        self.validate_url(
            &self.weather.reverse_geocoding_url,
            "weather.reverse_geocoding_url",
            &mut result,
        );
        self.validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);
        self.validate_url(&self.advisor.proxy_url, "advisor.proxy_url", &mut result);

        // Open-Meteo serves at most 16 forecast days
        if self.weather.forecast_days == 0 || self.weather.forecast_days > 16 {
            result.add_error(
                "weather.forecast_days",
                "Forecast days must be between 1 and 16",
            );
        }

        if !(self.weather.similar_coords_threshold > 0.0) {
            result.add_error(
                "weather.similar_coords_threshold",
                "Threshold must be a positive number of degrees",
            );
        } else if self.weather.similar_coords_threshold > 1.0 {
            result.add_warning(
                "weather.similar_coords_threshold",
                "Threshold above 1 degree reuses the cached location across ~100 km",
            );
        }

        if self.weather.search_debounce_ms == 0 {
            result.add_warning(
                "weather.search_debounce_ms",
                "Search debounce disabled (0 ms); every keystroke issues a search",
            );
        } else if self.weather.search_debounce_ms > 5000 {
            result.add_warning(
                "weather.search_debounce_ms",
                "Search debounce is longer than 5 seconds",
            );
        }

        if self.weather.search_result_count == 0 {
            result.add_error(
                "weather.search_result_count",
                "Search result count must be greater than 0",
            );
        }

        if self.weather.user_agent.trim().is_empty() {
            result.add_error(
                "weather.user_agent",
                "A user agent is required by the reverse geocoding service",
            );
        }

        match self.weather.position {
            Some(position) => {
                if !(-90.0..=90.0).contains(&position.latitude) {
                    result.add_error(
                        "weather.position.latitude",
                        format!("Invalid latitude: {}", position.latitude),
                    );
                }
                if !(-180.0..=180.0).contains(&position.longitude) {
                    result.add_error(
                        "weather.position.longitude",
                        format!("Invalid longitude: {}", position.longitude),
                    );
                }
            }
            None => result.add_warning(
                "weather.position",
                "No device position configured - location must be searched manually",
            ),
        }

        if self.advisor.max_attempts == 0 {
            result.add_error(
                "advisor.max_attempts",
                "Advisor needs at least one attempt",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }
}
