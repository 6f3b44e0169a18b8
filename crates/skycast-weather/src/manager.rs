//! User location with a persisted TTL cache and single-flight detection.
//!
//! `user_location` answers from the persisted cache when it is fresh.
//! Otherwise it joins the detection already in flight, or starts one.
//! However many callers arrive during one detection window, the device
//! source and the geocoder are each asked exactly once.
//!
//! "No location" is `Ok(None)`. `Err` is reserved for a stored blob that
//! cannot be parsed.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::clock::Clock;
use crate::geocode::{fallback_place, Geocoder};
use crate::location::{LocationSource, Permission};
use crate::storage::AppStorage;
use crate::store::KeyValueStore;
use crate::types::{PlaceLocation, StorageError};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_DETECTION_TIMEOUT: Duration = Duration::from_secs(15);

type Detection = Shared<BoxFuture<'static, Option<PlaceLocation>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSettings {
    /// Cached location lifetime
    pub max_age: Duration,
    /// Bound on one device position fix
    pub detection_timeout: Duration,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            detection_timeout: DEFAULT_DETECTION_TIMEOUT,
        }
    }
}

struct InFlight {
    generation: u64,
    detection: Detection,
}

#[derive(Default)]
struct DetectionSlot {
    current: Option<InFlight>,
    next_generation: u64,
}

/// Empties the slot when the detection task finishes or is dropped
/// (panic, runtime shutdown). A newer generation is left alone.
struct SlotRelease {
    slot: Arc<Mutex<DetectionSlot>>,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot
            .current
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == self.generation)
        {
            slot.current = None;
        }
    }
}

pub struct LocationManager {
    storage: AppStorage,
    source: Arc<dyn LocationSource>,
    geocoder: Arc<dyn Geocoder>,
    settings: LocationSettings,
    slot: Arc<Mutex<DetectionSlot>>,
}

impl LocationManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn LocationSource>,
        geocoder: Arc<dyn Geocoder>,
        clock: Arc<dyn Clock>,
        settings: LocationSettings,
    ) -> Self {
        Self {
            storage: AppStorage::new(store, clock),
            source,
            geocoder,
            settings,
            slot: Arc::new(Mutex::new(DetectionSlot::default())),
        }
    }

    /// Typed storage (saved cities, preferences) sharing this manager's store.
    pub fn storage(&self) -> &AppStorage {
        &self.storage
    }

    pub fn settings(&self) -> LocationSettings {
        self.settings
    }

    /// Best known location of the user.
    ///
    /// Must be called from within a tokio runtime; detection runs as a
    /// spawned task.
    pub async fn user_location(&self) -> Result<Option<PlaceLocation>, StorageError> {
        if let Some(place) = self.storage.user_location(self.settings.max_age)? {
            tracing::debug!("Using cached user location: {}", place.name);
            return Ok(Some(place));
        }

        Ok(self.join_or_start().await)
    }

    /// Drop every cached position and detect from scratch.
    pub async fn refresh_location(&self) -> Result<Option<PlaceLocation>, StorageError> {
        tracing::info!("Forcing location refresh");
        self.storage.clear_user_location();
        self.source.clear_cache();
        self.user_location().await
    }

    /// Whether a fresh cached location exists. Never triggers detection.
    pub fn has_cached_location(&self) -> Result<bool, StorageError> {
        self.storage.has_user_location(self.settings.max_age)
    }

    /// Persist `place` as the user's location, e.g. after a manual pick.
    pub fn set_user_location(&self, place: &PlaceLocation) {
        self.storage.set_user_location(place);
    }

    /// Whether a detection is currently outstanding.
    pub fn is_detecting(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    // The slot is claimed under the lock, so a second caller can never
    // start its own detection while one is outstanding. The task is spawned
    // after the lock is dropped and frees the slot before publishing.
    fn join_or_start(&self) -> Detection {
        let (detection, generation, tx) = {
            let mut slot = self.slot.lock();
            if let Some(in_flight) = &slot.current {
                tracing::debug!("Location detection already in progress, waiting");
                return in_flight.detection.clone();
            }

            let generation = slot.next_generation;
            slot.next_generation += 1;

            let (tx, rx) = oneshot::channel();
            let detection = async move {
                rx.await.unwrap_or_else(|_| {
                    tracing::error!("Location detection ended without a result");
                    None
                })
            }
            .boxed()
            .shared();

            slot.current = Some(InFlight {
                generation,
                detection: detection.clone(),
            });
            (detection, generation, tx)
        };

        let release = SlotRelease {
            slot: Arc::clone(&self.slot),
            generation,
        };
        let storage = self.storage.clone();
        let source = Arc::clone(&self.source);
        let geocoder = Arc::clone(&self.geocoder);
        let timeout = self.settings.detection_timeout;

        tokio::spawn(
            async move {
                let place = detect(storage, source, geocoder, timeout).await;
                drop(release);
                // every caller may already be gone
                let _ = tx.send(place);
            }
            .instrument(tracing::info_span!("location.detect", generation)),
        );

        detection
    }
}

async fn detect(
    storage: AppStorage,
    source: Arc<dyn LocationSource>,
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
) -> Option<PlaceLocation> {
    tracing::info!("Starting fresh location detection");

    if source.request_permission().await == Permission::Denied {
        tracing::warn!("Location detection failed: permission denied");
        return None;
    }

    let coords = match tokio::time::timeout(timeout, source.current_coordinates()).await {
        Ok(Ok(coords)) => coords,
        Ok(Err(e)) => {
            tracing::warn!("Location detection failed: {}", e);
            return None;
        }
        Err(_) => {
            tracing::warn!("Location detection failed: timed out after {:?}", timeout);
            return None;
        }
    };
    tracing::debug!("Got coordinates: {}, {}", coords.latitude, coords.longitude);

    let place = match geocoder.reverse(coords).await {
        Ok(found) => found.into_place(coords),
        Err(e) => {
            let fallback = fallback_place(coords);
            tracing::warn!(
                "Failed to resolve place name, using {}: {}",
                fallback.name,
                e
            );
            fallback
        }
    };

    storage.set_user_location(&place);
    tracing::info!("Location detection complete: {}", place.name);
    Some(place)
}
