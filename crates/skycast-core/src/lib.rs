pub mod config;
pub mod error;

pub use config::{
    Config, FixedPosition, GeocodingConfig, LocationConfig, StorageConfig, TemperatureUnit,
    ValidationResult, WeatherConfig,
};
pub use error::{
    AppError, ConfigError, GeocodingError, LocationError, NetworkError, StorageError,
};

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Skycast core initialized");
    Ok(())
}
