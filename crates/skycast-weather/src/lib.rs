//! Location and weather-theme services for Skycast
//!
//! Detects where the user is (device position, reverse geocoding, a
//! persisted TTL cache with single-flight detection), searches cities,
//! keeps the saved-cities list and unit preference, and maps Open-Meteo
//! conditions to a background gradient.

pub mod clock;
pub mod geocode;
pub mod location;
pub mod manager;
pub mod provider;
pub mod storage;
pub mod store;
pub mod theme;
pub mod types;
pub mod units;

pub use clock::{Clock, SystemClock};
pub use geocode::{coordinate_label, fallback_place, Geocoder, GeocoderEndpoints, HttpGeocoder};
pub use location::{
    CachingLocationSource, FixedLocationSource, IpLocationSource, LocationSource, Permission,
};
pub use manager::{LocationManager, LocationSettings};
pub use provider::{ConditionsProvider, CurrentConditions, WeatherProvider};
pub use storage::AppStorage;
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use theme::{gradient, theme_key, theme_key_at, GradientRegistry, ThemeCategory, TimeOfDay};
pub use types::*;
pub use units::{to_celsius, to_fahrenheit, DisplayUnit};
