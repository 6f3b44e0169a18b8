//! Current conditions from the Open-Meteo forecast API.
//!
//! Only what the theme selector and place enrichment need is read: the
//! location's timezone, its UTC offset, the current weather code, the
//! day flag, today's sun times and the temperature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::theme::{self, SolarContext};
use crate::types::{Coordinates, TemperatureUnit, WeatherError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// What the app consumes from a forecast
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i32>,
    pub weather_code: i32,
    pub is_day: bool,
    /// Epoch seconds
    pub sunrise: Option<i64>,
    /// Epoch seconds
    pub sunset: Option<i64>,
    pub temperature: Option<f64>,
}

impl CurrentConditions {
    pub fn solar_context(&self) -> SolarContext {
        SolarContext {
            sunrise: self.sunrise,
            sunset: self.sunset,
            timezone: self.timezone.clone(),
            utc_offset_seconds: self.utc_offset_seconds,
        }
    }

    /// Background theme for these conditions at `now`.
    pub fn theme_key(&self, now: DateTime<Utc>) -> String {
        theme::theme_key_at(now, self.weather_code, self.is_day, &self.solar_context())
    }
}

#[async_trait]
pub trait ConditionsProvider: Send + Sync {
    async fn conditions(&self, coords: Coordinates) -> Result<CurrentConditions, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    timezone: Option<String>,
    utc_offset_seconds: Option<i32>,
    current: Option<ForecastCurrent>,
    daily: Option<ForecastDaily>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    weather_code: Option<i32>,
    is_day: Option<u8>,
    temperature_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastDaily {
    #[serde(default)]
    sunrise: Vec<i64>,
    #[serde(default)]
    sunset: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    forecast_url: String,
    unit: TemperatureUnit,
}

impl WeatherProvider {
    pub fn new(
        forecast_url: impl Into<String>,
        unit: TemperatureUnit,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            forecast_url: forecast_url.into(),
            unit,
        })
    }
}

#[async_trait]
impl ConditionsProvider for WeatherProvider {
    async fn conditions(&self, coords: Coordinates) -> Result<CurrentConditions, WeatherError> {
        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();

        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", "weather_code,is_day,temperature_2m"),
                ("daily", "sunrise,sunset"),
                ("timezone", "auto"),
                ("timeformat", "unixtime"),
                ("forecast_days", "1"),
                ("temperature_unit", self.unit.api_value()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Forecast returned status {}", response.status());
            return Err(WeatherError::Status(response.status().as_u16()));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;

        let current = body
            .current
            .ok_or_else(|| WeatherError::Parse("missing current block".to_string()))?;
        let weather_code = current
            .weather_code
            .ok_or_else(|| WeatherError::Parse("missing current.weather_code".to_string()))?;
        let daily = body.daily;

        Ok(CurrentConditions {
            timezone: body.timezone,
            utc_offset_seconds: body.utc_offset_seconds,
            weather_code,
            is_day: current.is_day.map_or(true, |d| d != 0),
            sunrise: daily.as_ref().and_then(|d| d.sunrise.first().copied()),
            sunset: daily.as_ref().and_then(|d| d.sunset.first().copied()),
            temperature: current.temperature_2m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_conditions_theme_key() {
        let noon = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).single().unwrap_or_default();
        let conditions = CurrentConditions {
            timezone: Some("UTC".to_string()),
            utc_offset_seconds: Some(0),
            weather_code: 95,
            is_day: true,
            sunrise: Some(noon.timestamp() - 5 * 3600),
            sunset: Some(noon.timestamp() + 5 * 3600),
            temperature: Some(3.5),
        };
        assert_eq!(conditions.theme_key(noon), "thunderstorm_day");
        assert_eq!(
            conditions.theme_key(noon + chrono::Duration::hours(5)),
            "thunderstorm_evening"
        );
    }

    #[test]
    fn test_solar_context_carries_zone() {
        let conditions = CurrentConditions {
            timezone: Some("Europe/Berlin".to_string()),
            utc_offset_seconds: Some(3600),
            weather_code: 0,
            is_day: false,
            sunrise: None,
            sunset: None,
            temperature: None,
        };
        let ctx = conditions.solar_context();
        assert_eq!(ctx.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(ctx.utc_offset_seconds, Some(3600));
        assert!(ctx.sunrise.is_none());
    }
}
