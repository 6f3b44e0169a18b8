use serde::{Deserialize, Serialize};

/// Two places closer than this on both axes are treated as the same place.
pub const SAME_PLACE_TOLERANCE_DEG: f64 = 0.01;

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Value for the forecast API's `temperature_unit` parameter
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::Auto | Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }
}

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting values outside [-90, 90] / [-180, 180].
    pub fn try_new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// A named place, as produced by geocoding or detection.
///
/// Stored with the field names `lat`, `lon` and `utcOffset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceLocation {
    pub name: String,
    pub country: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(rename = "utcOffset", default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_seconds: Option<i32>,
}

impl PlaceLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Loose identity used for the saved-cities list: both axes within
    /// [`SAME_PLACE_TOLERANCE_DEG`]. Name and country are ignored.
    pub fn is_same_place(&self, other: &PlaceLocation) -> bool {
        (self.latitude - other.latitude).abs() < SAME_PLACE_TOLERANCE_DEG
            && (self.longitude - other.longitude).abs() < SAME_PLACE_TOLERANCE_DEG
    }
}

/// A place plus the moment it was captured, as persisted for the user location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    #[serde(flatten)]
    pub place: PlaceLocation,
    /// Capture time in epoch milliseconds. Missing means "infinitely old".
    #[serde(default)]
    pub timestamp: i64,
}

impl CachedLocation {
    /// Valid while `now - timestamp < max_age`.
    pub fn is_fresh(&self, now_ms: i64, max_age: std::time::Duration) -> bool {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) < max_age_ms
    }
}

/// Location service errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Geocoding service errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Geocoding service returned status {0}")]
    Status(u16),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No usable place for the given input")]
    NoResult,
}

/// Key-value storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Stored value for {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Weather service returned status {0}")]
    Status(u16),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::time::Duration;

    fn place(lat: f64, lon: f64) -> PlaceLocation {
        PlaceLocation {
            name: "Somewhere".to_string(),
            country: "Nowhere".to_string(),
            latitude: lat,
            longitude: lon,
            timezone: None,
            utc_offset_seconds: None,
        }
    }

    #[test]
    fn test_coordinates_range() {
        assert!(Coordinates::try_new(90.0, 180.0).is_some());
        assert!(Coordinates::try_new(-90.0, -180.0).is_some());
        assert!(Coordinates::try_new(90.5, 0.0).is_none());
        assert!(Coordinates::try_new(0.0, -180.1).is_none());
        assert!(Coordinates::try_new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_same_place_within_tolerance() {
        let a = place(48.8566, 2.3522);
        let mut b = place(48.8606, 2.3480);
        b.name = "Paris 1er".to_string();
        assert!(a.is_same_place(&b));
    }

    #[test]
    fn test_same_place_needs_both_axes() {
        let a = place(48.8566, 2.3522);
        assert!(!a.is_same_place(&place(48.8566, 2.3700)));
        assert!(!a.is_same_place(&place(48.8700, 2.3522)));
    }

    #[test]
    fn test_place_wire_format() {
        let mut p = place(1.5, -2.5);
        p.utc_offset_seconds = Some(3600);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["lat"], 1.5);
        assert_eq!(json["lon"], -2.5);
        assert_eq!(json["utcOffset"], 3600);
        assert!(json.get("timezone").is_none());
    }

    #[test]
    fn test_cached_location_is_flat() {
        let cached = CachedLocation {
            place: place(10.0, 20.0),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&cached).unwrap();
        assert_eq!(json["name"], "Somewhere");
        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);

        let back: CachedLocation = serde_json::from_value(json).unwrap();
        assert_eq!(back, cached);
    }

    #[test]
    fn test_cached_location_freshness_boundary() {
        let max_age = Duration::from_secs(24 * 60 * 60);
        let cached = CachedLocation {
            place: place(0.0, 0.0),
            timestamp: 1_000,
        };
        let day_ms = 24 * 60 * 60 * 1000;
        assert!(cached.is_fresh(1_000 + day_ms - 1, max_age));
        assert!(!cached.is_fresh(1_000 + day_ms, max_age));
    }

    #[test]
    fn test_missing_timestamp_is_stale() {
        let json = r#"{"name":"A","country":"B","lat":1.0,"lon":2.0}"#;
        let cached: CachedLocation = serde_json::from_str(json).unwrap();
        assert_eq!(cached.timestamp, 0);
        assert!(!cached.is_fresh(1_700_000_000_000, Duration::from_secs(86_400)));
    }

    #[test]
    fn test_temperature_unit_api_value() {
        assert_eq!(TemperatureUnit::Auto.api_value(), "celsius");
        assert_eq!(TemperatureUnit::Fahrenheit.api_value(), "fahrenheit");
    }
}
