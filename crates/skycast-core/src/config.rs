use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

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

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
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

    /// Location detection and caching
    #[serde(default)]
    pub location: LocationConfig,

    /// Geocoding endpoints
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Local key-value storage
    #[serde(default)]
    pub storage: StorageConfig,
}

/// A manually pinned position, used instead of network detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// How long a detected location stays valid, in hours
    #[serde(default = "default_cache_max_age_hours")]
    pub cache_max_age_hours: u32,

    /// Upper bound on a single device lookup, in seconds
    #[serde(default = "default_detection_timeout_secs")]
    pub detection_timeout_secs: u64,

    /// How long the raw device fix is reused, in seconds
    #[serde(default = "default_device_cache_max_age_secs")]
    pub device_cache_max_age_secs: u64,

    /// Whether IP based lookup is permitted. Acts as the location permission.
    #[serde(default = "default_true")]
    pub ip_lookup_enabled: bool,

    /// Skip detection entirely and always report this position
    #[serde(default)]
    pub fixed: Option<FixedPosition>,
}

fn default_cache_max_age_hours() -> u32 {
    24
}

fn default_detection_timeout_secs() -> u64 {
    15
}

fn default_device_cache_max_age_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            cache_max_age_hours: default_cache_max_age_hours(),
            detection_timeout_secs: default_detection_timeout_secs(),
            device_cache_max_age_secs: default_device_cache_max_age_secs(),
            ip_lookup_enabled: true,
            fixed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Reverse geocoding endpoint (Nominatim compatible)
    #[serde(default = "default_reverse_url")]
    pub reverse_url: String,

    /// Forward search endpoint (Open-Meteo geocoding compatible)
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// IP geolocation endpoint (ip-api compatible)
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// User agent sent with every geocoding request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of search results
    #[serde(default = "default_search_count")]
    pub search_count: u32,
}

fn default_reverse_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_search_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_ip_lookup_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_user_agent() -> String {
    format!("Skycast/{}", env!("CARGO_PKG_VERSION"))
}

fn default_search_count() -> u32 {
    10
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            reverse_url: default_reverse_url(),
            search_url: default_search_url(),
            ip_lookup_url: default_ip_lookup_url(),
            user_agent: default_user_agent(),
            search_count: default_search_count(),
        }
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Temperature unit preference
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Refresh interval in minutes
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// Forecast endpoint (Open-Meteo compatible)
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
}

fn default_refresh_minutes() -> u32 {
    15
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Auto,
            refresh_minutes: default_refresh_minutes(),
            forecast_url: default_forecast_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file name, relative to the config directory unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "skycast.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            location: LocationConfig::default(),
            geocoding: GeocodingConfig::default(),
            weather: WeatherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let mut config = Self::default();
            if let Some(parent) = config_path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config_path =
            Self::config_path().map_err(|e| ConfigError::NotFound(e.to_string()))?;
        Self::load_validated_from(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn load_validated_from(
        config_path: &Path,
    ) -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load_from(config_path)
            .map_err(|e| ConfigError::ParseError(format!("{:#}", e)))?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.geocoding.reverse_url, "geocoding.reverse_url", &mut result);
        self.validate_url(&self.geocoding.search_url, "geocoding.search_url", &mut result);
        self.validate_url(&self.geocoding.ip_lookup_url, "geocoding.ip_lookup_url", &mut result);
        self.validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);

        if self.location.cache_max_age_hours == 0 {
            result.add_error(
                "location.cache_max_age_hours",
                "Cache lifetime must be greater than 0",
            );
        } else if self.location.cache_max_age_hours > 24 * 30 {
            result.add_warning(
                "location.cache_max_age_hours",
                "Cached location is kept for more than 30 days",
            );
        }

        if self.location.detection_timeout_secs == 0 {
            result.add_error(
                "location.detection_timeout_secs",
                "Detection timeout must be greater than 0",
            );
        } else if self.location.detection_timeout_secs > 120 {
            result.add_warning(
                "location.detection_timeout_secs",
                "Detection timeout is unusually long (>120s)",
            );
        }

        if let Some(fixed) = &self.location.fixed {
            if !(-90.0..=90.0).contains(&fixed.latitude) {
                result.add_error("location.fixed.latitude", "Latitude must be within [-90, 90]");
            }
            if !(-180.0..=180.0).contains(&fixed.longitude) {
                result.add_error(
                    "location.fixed.longitude",
                    "Longitude must be within [-180, 180]",
                );
            }
        } else if !self.location.ip_lookup_enabled {
            result.add_warning(
                "location",
                "IP lookup disabled and no fixed position - detection will always fail",
            );
        }

        if self.geocoding.user_agent.trim().is_empty() {
            result.add_error("geocoding.user_agent", "User agent must not be empty");
        }

        if self.geocoding.search_count == 0 {
            result.add_error("geocoding.search_count", "Search count must be greater than 0");
        } else if self.geocoding.search_count > 100 {
            result.add_warning("geocoding.search_count", "Search count is capped at 100 upstream");
        }

        // Validate weather refresh interval
        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh interval is more than 24 hours",
            );
        }

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name must not be empty");
        }

        result
    }

    /// Validate a URL field
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

    /// Absolute path of the key-value database
    pub fn database_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.storage.database_file);
        if file.is_absolute() {
            file
        } else {
            self.config_dir.join(file)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
