//! Composition root: builds every collaborator from config and hands them
//! to the location manager.

use std::sync::Arc;
use std::time::Duration;

use skycast_core::{AppError, Config, ConfigError};
use skycast_weather::{
    CachingLocationSource, ConditionsProvider, Coordinates, DisplayUnit, FixedLocationSource,
    Geocoder, GeocoderEndpoints, HttpGeocoder, IpLocationSource, LocationManager,
    LocationSettings, LocationSource, SqliteStore, SystemClock, TemperatureUnit, WeatherProvider,
};

use crate::errors::IntoAppError;

pub struct App {
    pub manager: LocationManager,
    pub geocoder: Arc<dyn Geocoder>,
    pub conditions: Arc<dyn ConditionsProvider>,
    /// Unit forced by config; `None` defers to the stored preference.
    pub configured_unit: Option<DisplayUnit>,
    pub refresh_interval: Duration,
}

impl App {
    pub fn build(config: &Config) -> Result<Self, AppError> {
        let db_path = config.database_path();
        let store = SqliteStore::open(&db_path).map_err(IntoAppError::into_app_error)?;
        tracing::debug!("Using database {}", db_path.display());

        // Readings are always fetched in Celsius and converted for display.
        let provider: Arc<dyn ConditionsProvider> = Arc::new(
            WeatherProvider::new(config.weather.forecast_url.as_str(), TemperatureUnit::Celsius)
                .map_err(IntoAppError::into_app_error)?,
        );

        let geocoder = HttpGeocoder::new(GeocoderEndpoints {
            reverse_url: config.geocoding.reverse_url.clone(),
            search_url: config.geocoding.search_url.clone(),
            user_agent: config.geocoding.user_agent.clone(),
            search_count: config.geocoding.search_count,
        })
        .map_err(IntoAppError::into_app_error)?
        .with_conditions(Arc::clone(&provider));
        let geocoder: Arc<dyn Geocoder> = Arc::new(geocoder);

        let manager = LocationManager::new(
            Arc::new(store),
            location_source(config)?,
            Arc::clone(&geocoder),
            Arc::new(SystemClock),
            location_settings(config),
        );

        let refresh_minutes = u64::from(config.weather.refresh_minutes.max(1));
        Ok(Self {
            manager,
            geocoder,
            conditions: provider,
            configured_unit: configured_unit(config.weather.temperature_unit),
            refresh_interval: Duration::from_secs(refresh_minutes * 60),
        })
    }

    /// Unit to display temperatures in: config wins, then the stored preference.
    pub fn display_unit(&self) -> DisplayUnit {
        self.configured_unit.unwrap_or_else(|| self.manager.storage().unit())
    }
}

fn location_source(config: &Config) -> Result<Arc<dyn LocationSource>, AppError> {
    let location = &config.location;

    let device: Arc<dyn LocationSource> = match &location.fixed {
        Some(fixed) => {
            let coords = Coordinates::try_new(fixed.latitude, fixed.longitude).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "location.fixed is out of range: {}, {}",
                    fixed.latitude, fixed.longitude
                ))
            })?;
            tracing::info!("Using fixed location {}, {}", coords.latitude, coords.longitude);
            Arc::new(FixedLocationSource::new(coords))
        }
        None => Arc::new(
            IpLocationSource::new(
                config.geocoding.ip_lookup_url.as_str(),
                &config.geocoding.user_agent,
                location.ip_lookup_enabled,
            )
            .map_err(IntoAppError::into_app_error)?,
        ),
    };

    Ok(Arc::new(CachingLocationSource::new(
        device,
        Duration::from_secs(location.device_cache_max_age_secs),
    )))
}

pub fn location_settings(config: &Config) -> LocationSettings {
    LocationSettings {
        max_age: Duration::from_secs(u64::from(config.location.cache_max_age_hours) * 60 * 60),
        detection_timeout: Duration::from_secs(config.location.detection_timeout_secs),
    }
}

fn configured_unit(unit: skycast_core::TemperatureUnit) -> Option<DisplayUnit> {
    match unit {
        skycast_core::TemperatureUnit::Auto => None,
        skycast_core::TemperatureUnit::Celsius => Some(DisplayUnit::Celsius),
        skycast_core::TemperatureUnit::Fahrenheit => Some(DisplayUnit::Fahrenheit),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use skycast_core::FixedPosition;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.config_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_location_settings_from_config() {
        let mut config = Config::default();
        config.location.cache_max_age_hours = 2;
        config.location.detection_timeout_secs = 5;

        let settings = location_settings(&config);
        assert_eq!(settings.max_age, Duration::from_secs(7200));
        assert_eq!(settings.detection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_default_settings_match_manager_defaults() {
        assert_eq!(location_settings(&Config::default()), LocationSettings::default());
    }

    #[test]
    fn test_out_of_range_fixed_position_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.location.fixed = Some(FixedPosition {
            latitude: 95.0,
            longitude: 0.0,
        });

        match App::build(&config) {
            Err(AppError::Config(ConfigError::Invalid(reason))) => {
                assert!(reason.contains("location.fixed"))
            }
            Err(other) => panic!("expected config error, got {other}"),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[test]
    fn test_unopenable_database_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "not a directory").unwrap();
        let mut config = config_in(&dir);
        config.storage.database_file = "blocker/skycast.db".to_string();

        assert!(matches!(App::build(&config), Err(AppError::Storage(_))));
    }

    #[test]
    fn test_display_unit_prefers_config_then_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);

        let app = App::build(&config).unwrap();
        assert_eq!(app.display_unit(), DisplayUnit::Celsius);
        app.manager.storage().set_unit(DisplayUnit::Fahrenheit);
        assert_eq!(app.display_unit(), DisplayUnit::Fahrenheit);
        drop(app);

        config.weather.temperature_unit = skycast_core::TemperatureUnit::Celsius;
        let app = App::build(&config).unwrap();
        assert_eq!(app.display_unit(), DisplayUnit::Celsius);
    }
}
