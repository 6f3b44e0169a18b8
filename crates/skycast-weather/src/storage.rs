//! Typed access to the app's persisted state: remember-me preference,
//! temperature unit, saved cities and the cached user location.
//!
//! Environmental failures never escape from here. A failed read is a cache
//! miss, a failed write is logged and dropped. The only error surfaced is a
//! user-location blob that exists but cannot be parsed.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::store::KeyValueStore;
use crate::types::{CachedLocation, PlaceLocation, StorageError};
use crate::units::DisplayUnit;

pub const REMEMBER_ME_KEY: &str = "weather_app_remember_me";
pub const USER_EMAIL_KEY: &str = "weather_app_user_email";
pub const SAVED_CITIES_KEY: &str = "weather_app_saved_cities";
pub const USER_LOCATION_KEY: &str = "weather_app_user_location";
pub const UNIT_KEY: &str = "unit";

#[derive(Clone)]
pub struct AppStorage {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl AppStorage {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Error reading {}: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::error!("Error writing {}: {}", key, e);
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::error!("Error removing {}: {}", key, e);
        }
    }

    // Remember me

    pub fn set_remember_me(&self, remember: bool) {
        self.write(REMEMBER_ME_KEY, if remember { "true" } else { "false" });
    }

    pub fn remember_me(&self) -> bool {
        self.read(REMEMBER_ME_KEY).as_deref() == Some("true")
    }

    pub fn set_user_email(&self, email: &str) {
        self.write(USER_EMAIL_KEY, email);
    }

    pub fn user_email(&self) -> Option<String> {
        self.read(USER_EMAIL_KEY)
    }

    pub fn clear_remember_me(&self) {
        self.delete(REMEMBER_ME_KEY);
        self.delete(USER_EMAIL_KEY);
    }

    // Temperature unit

    pub fn set_unit(&self, unit: DisplayUnit) {
        self.write(UNIT_KEY, unit.code());
    }

    /// Stored display unit. Missing or unrecognised values read as Celsius.
    pub fn unit(&self) -> DisplayUnit {
        self.read(UNIT_KEY)
            .as_deref()
            .and_then(DisplayUnit::from_code)
            .unwrap_or_default()
    }

    // Saved cities

    pub fn set_saved_cities(&self, cities: &[PlaceLocation]) {
        match serde_json::to_string(cities) {
            Ok(json) => self.write(SAVED_CITIES_KEY, &json),
            Err(e) => tracing::error!("Error serializing saved cities: {}", e),
        }
    }

    /// Saved cities in insertion order. Missing or unreadable data is an empty list.
    pub fn saved_cities(&self) -> Vec<PlaceLocation> {
        let Some(json) = self.read(SAVED_CITIES_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::error!("Error parsing saved cities: {}", e);
            Vec::new()
        })
    }

    /// Append `city` unless an entry for the same place already exists.
    /// Returns whether the list changed.
    pub fn add_saved_city(&self, city: &PlaceLocation) -> bool {
        let mut cities = self.saved_cities();
        if cities.iter().any(|existing| existing.is_same_place(city)) {
            tracing::debug!("{} is already saved", city.name);
            return false;
        }
        cities.push(city.clone());
        self.set_saved_cities(&cities);
        true
    }

    /// Drop every entry for the same place as `city`. Returns how many were removed.
    pub fn remove_saved_city(&self, city: &PlaceLocation) -> usize {
        let mut cities = self.saved_cities();
        let before = cities.len();
        cities.retain(|existing| !existing.is_same_place(city));
        let removed = before - cities.len();
        if removed > 0 {
            self.set_saved_cities(&cities);
        }
        removed
    }

    // User location

    pub fn set_user_location(&self, place: &PlaceLocation) {
        let cached = CachedLocation {
            place: place.clone(),
            timestamp: self.clock.now_millis(),
        };
        match serde_json::to_string(&cached) {
            Ok(json) => {
                self.write(USER_LOCATION_KEY, &json);
                tracing::info!("User location saved to cache: {}", place.name);
            }
            Err(e) => tracing::error!("Error serializing user location: {}", e),
        }
    }

    /// The cached user location if it is younger than `max_age`.
    /// An expired entry is purged on the way out.
    pub fn user_location(&self, max_age: Duration) -> Result<Option<PlaceLocation>, StorageError> {
        let Some(json) = self.read(USER_LOCATION_KEY) else {
            tracing::debug!("No cached user location found");
            return Ok(None);
        };

        let cached: CachedLocation =
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
                key: USER_LOCATION_KEY.to_string(),
                reason: e.to_string(),
            })?;

        if !cached.is_fresh(self.clock.now_millis(), max_age) {
            tracing::info!("Cached user location expired, clearing cache");
            self.clear_user_location();
            return Ok(None);
        }

        Ok(Some(cached.place))
    }

    pub fn has_user_location(&self, max_age: Duration) -> Result<bool, StorageError> {
        Ok(self.user_location(max_age)?.is_some())
    }

    pub fn clear_user_location(&self) {
        self.delete(USER_LOCATION_KEY);
        tracing::debug!("User location cache cleared");
    }
}
