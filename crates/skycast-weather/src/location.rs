//! Device location sources.
//!
//! A desktop has no GPS, so the "device" position comes either from IP
//! geolocation or from a position pinned in config. Both sit behind the
//! same `LocationSource` trait the location manager consumes.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{Coordinates, LocationError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Outcome of asking for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn request_permission(&self) -> Permission;

    /// One best-effort position fix.
    async fn current_coordinates(&self) -> Result<Coordinates, LocationError>;

    /// Forget any memoized fix.
    fn clear_cache(&self) {}
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Approximate position from an ip-api compatible endpoint.
#[derive(Debug, Clone)]
pub struct IpLocationSource {
    client: Client,
    url: String,
    enabled: bool,
}

impl IpLocationSource {
    pub fn new(
        url: impl Into<String>,
        user_agent: &str,
        enabled: bool,
    ) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .map_err(|e| LocationError::Other(format!("Failed to create location client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            enabled,
        })
    }
}

#[async_trait]
impl LocationSource for IpLocationSource {
    async fn request_permission(&self) -> Permission {
        if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        if !self.enabled {
            return Err(LocationError::PermissionDenied);
        }

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                tracing::debug!("IP location request failed: {}", e);
                LocationError::ServiceUnavailable
            }
        })?;

        if !response.status().is_success() {
            tracing::debug!("IP location returned status {}", response.status());
            return Err(LocationError::ServiceUnavailable);
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(format!("Invalid IP location response: {}", e)))?;

        if let Some(status) = body.status.as_deref() {
            if status != "success" {
                let reason = body.message.unwrap_or_else(|| status.to_string());
                return Err(LocationError::Other(reason));
            }
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Coordinates::try_new(lat, lon).ok_or_else(|| {
                LocationError::Other(format!("Coordinates out of range: {}, {}", lat, lon))
            }),
            _ => Err(LocationError::Other("Response has no coordinates".to_string())),
        }
    }
}

/// Always reports the same configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationSource {
    coordinates: Coordinates,
}

impl FixedLocationSource {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        Ok(self.coordinates)
    }
}

/// Reuses the last successful fix for `max_age`.
pub struct CachingLocationSource {
    inner: Arc<dyn LocationSource>,
    max_age: Duration,
    last: Mutex<Option<(Instant, Coordinates)>>,
}

impl CachingLocationSource {
    pub fn new(inner: Arc<dyn LocationSource>, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            last: Mutex::new(None),
        }
    }

    fn recent(&self) -> Option<Coordinates> {
        let last = self.last.lock();
        match *last {
            Some((at, coords)) if at.elapsed() < self.max_age => Some(coords),
            _ => None,
        }
    }
}

#[async_trait]
impl LocationSource for CachingLocationSource {
    async fn request_permission(&self) -> Permission {
        self.inner.request_permission().await
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        if let Some(coords) = self.recent() {
            tracing::debug!("Using cached device position");
            return Ok(coords);
        }

        let coords = self.inner.current_coordinates().await?;
        *self.last.lock() = Some((Instant::now(), coords));
        Ok(coords)
    }

    fn clear_cache(&self) {
        *self.last.lock() = None;
        self.inner.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LocationSource for CountingSource {
        async fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Coordinates {
                latitude: n as f64,
                longitude: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn test_fixed_source() {
        let coords = Coordinates::try_new(47.6062, -122.3321).unwrap();
        let source = FixedLocationSource::new(coords);
        assert_eq!(source.request_permission().await, Permission::Granted);
        assert_eq!(source.current_coordinates().await.unwrap(), coords);
    }

    #[tokio::test]
    async fn test_disabled_ip_source_is_denied() {
        let source = IpLocationSource::new("http://127.0.0.1:9/json", "test", false).unwrap();
        assert_eq!(source.request_permission().await, Permission::Denied);
        assert!(matches!(
            source.current_coordinates().await,
            Err(LocationError::PermissionDenied)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caching_source_reuses_recent_fix() {
        let inner = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let source = CachingLocationSource::new(inner.clone(), Duration::from_secs(60));

        let first = source.current_coordinates().await.unwrap();
        let second = source.current_coordinates().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        source.current_coordinates().await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_caching_source_clear_forces_lookup() {
        let inner = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let source = CachingLocationSource::new(inner.clone(), Duration::from_secs(60));

        source.current_coordinates().await.unwrap();
        source.clear_cache();
        source.current_coordinates().await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
