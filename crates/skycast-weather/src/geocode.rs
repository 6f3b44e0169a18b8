//! Geocoding: coordinates to place names and place names to coordinates.
//!
//! Reverse lookups use Nominatim (OpenStreetMap), forward search uses the
//! Open-Meteo geocoding API. Both are free and need no API key.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::ConditionsProvider;
use crate::types::{Coordinates, GeocodingError, PlaceLocation};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Country shown for a place we could only describe by its coordinates.
pub const FALLBACK_COUNTRY: &str = "Your Location";

/// Result of a reverse lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ReversePlace {
    pub name: String,
    pub country: String,
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i32>,
}

impl ReversePlace {
    pub fn into_place(self, coords: Coordinates) -> PlaceLocation {
        PlaceLocation {
            name: self.name,
            country: self.country,
            latitude: coords.latitude,
            longitude: coords.longitude,
            timezone: self.timezone,
            utc_offset_seconds: self.utc_offset_seconds,
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, coords: Coordinates) -> Result<ReversePlace, GeocodingError>;

    async fn search(&self, query: &str) -> Result<Vec<PlaceLocation>, GeocodingError>;
}

/// Human-readable label for bare coordinates, e.g. `48.857°N, 2.352°E`.
pub fn coordinate_label(coords: Coordinates) -> String {
    let lat_dir = if coords.latitude >= 0.0 { 'N' } else { 'S' };
    let lon_dir = if coords.longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{}°{}, {}°{}",
        trim_decimal(coords.latitude.abs()),
        lat_dir,
        trim_decimal(coords.longitude.abs()),
        lon_dir
    )
}

// Three decimals, trailing zeros dropped: 2.350 -> "2.35", 48.0 -> "48".
fn trim_decimal(value: f64) -> String {
    let fixed = format!("{:.3}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// A place described only by its coordinates.
pub fn fallback_place(coords: Coordinates) -> PlaceLocation {
    PlaceLocation {
        name: coordinate_label(coords),
        country: FALLBACK_COUNTRY.to_string(),
        latitude: coords.latitude,
        longitude: coords.longitude,
        timezone: None,
        utc_offset_seconds: None,
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    country_code: Option<String>,
    timezone: Option<String>,
}

/// HTTP geocoder endpoints
#[derive(Debug, Clone)]
pub struct GeocoderEndpoints {
    pub reverse_url: String,
    pub search_url: String,
    pub user_agent: String,
    pub search_count: u32,
}

pub struct HttpGeocoder {
    client: Client,
    endpoints: GeocoderEndpoints,
    conditions: Option<Arc<dyn ConditionsProvider>>,
}

impl HttpGeocoder {
    pub fn new(endpoints: GeocoderEndpoints) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(endpoints.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            endpoints,
            conditions: None,
        })
    }

    /// Fill in timezone and UTC offset on reverse lookups from a forecast call.
    pub fn with_conditions(mut self, provider: Arc<dyn ConditionsProvider>) -> Self {
        self.conditions = Some(provider);
        self
    }

    async fn lookup_name(&self, coords: Coordinates) -> Result<ReversePlace, GeocodingError> {
        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();

        let response = self
            .client
            .get(&self.endpoints.reverse_url)
            .query(&[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
                ("layer", "address"),
                ("zoom", "10"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Reverse geocode returned status {}", response.status());
            return Err(GeocodingError::Status(response.status().as_u16()));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::Parse(e.to_string()))?;

        let addr = body.address.ok_or(GeocodingError::NoResult)?;

        let country = addr
            .country
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| addr.country_code.as_ref().map(|c| c.to_uppercase()))
            .unwrap_or_else(|| "Unknown".to_string());

        // Prefer city > town > village > municipality for the primary place name
        let name = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .or(addr.state_district)
            .or(addr.county)
            .or(addr.state)
            .filter(|n| !n.trim().is_empty())
            .ok_or(GeocodingError::NoResult)?;

        Ok(ReversePlace {
            name,
            country,
            timezone: None,
            utc_offset_seconds: None,
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<ReversePlace, GeocodingError> {
        let mut place = self.lookup_name(coords).await?;

        if let Some(provider) = &self.conditions {
            match provider.conditions(coords).await {
                Ok(conditions) => {
                    place.timezone = conditions.timezone;
                    place.utc_offset_seconds = conditions.utc_offset_seconds;
                }
                Err(e) => {
                    tracing::debug!("Timezone lookup failed, keeping place without it: {}", e)
                }
            }
        }

        tracing::info!("Reverse geocoded to: {}, {}", place.name, place.country);
        Ok(place)
    }

    async fn search(&self, query: &str) -> Result<Vec<PlaceLocation>, GeocodingError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let count = self.endpoints.search_count.to_string();
        let response = self
            .client
            .get(&self.endpoints.search_url)
            .query(&[
                ("name", query),
                ("count", count.as_str()),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("City search for {:?} returned status {}", query, response.status());
            return Err(GeocodingError::Status(response.status().as_u16()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::Parse(e.to_string()))?;

        let places: Vec<PlaceLocation> = body
            .results
            .into_iter()
            .map(|r| PlaceLocation {
                name: r.name,
                country: r
                    .country
                    .or(r.country_code)
                    .unwrap_or_else(|| "Unknown".to_string()),
                latitude: r.latitude,
                longitude: r.longitude,
                timezone: r.timezone,
                utc_offset_seconds: None,
            })
            .collect();

        tracing::debug!("City search for {:?} returned {} results", query, places.len());
        Ok(places)
    }
}
