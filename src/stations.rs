/// Station selection and the shared in-memory station collection.
///
/// Distance filtering uses the haversine great-circle formula on a sphere
/// of radius 6371 km (no ellipsoid correction). The collection is guarded by
/// a single mutex for the whole list; every read or write, including
/// iteration for display, runs inside one of the `with_*` closures.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::Station;

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

/// Great-circle distance in kilometres between two `(lat, lon)` points
/// given in degrees.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Keeps stations whose city matches `city` exactly, ignoring case.
pub fn filter_by_city(stations: Vec<Station>, city: &str) -> Vec<Station> {
    let wanted = city.trim().to_lowercase();
    stations
        .into_iter()
        .filter(|s| s.city.to_lowercase() == wanted)
        .collect()
}

/// Keeps stations no further than `radius_km` from `center`.
///
/// Stations with unknown (0, 0) coordinates are measured as if they stood
/// at 0°N 0°E, which in practice excludes them.
pub fn filter_by_radius(stations: Vec<Station>, center: (f64, f64), radius_km: f64) -> Vec<Station> {
    stations
        .into_iter()
        .filter(|s| haversine_km(center, (s.latitude, s.longitude)) <= radius_km)
        .collect()
}

// ---------------------------------------------------------------------------
// Shared collection
// ---------------------------------------------------------------------------

/// The session's station list behind one coarse-grained lock.
#[derive(Clone, Default)]
pub struct StationCollection {
    inner: Arc<Mutex<Vec<Station>>>,
}

impl StationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Station>> {
        // A panic while holding the lock leaves the list itself intact.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with shared access for the whole duration of the closure.
    pub fn with_stations<R>(&self, f: impl FnOnce(&[Station]) -> R) -> R {
        let guard = self.lock();
        f(&guard)
    }

    /// Runs `f` with exclusive access for the whole duration of the closure.
    pub fn with_stations_mut<R>(&self, f: impl FnOnce(&mut Vec<Station>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Replaces the whole list, e.g. with a fresh remote fetch.
    pub fn replace_all(&self, stations: Vec<Station>) {
        *self.lock() = stations;
    }

    /// Replaces the station with the same id, or appends it.
    pub fn upsert(&self, station: Station) {
        let mut guard = self.lock();
        match guard.iter_mut().find(|s| s.id == station.id) {
            Some(existing) => *existing = station,
            None => guard.push(station),
        }
    }

    /// Clone of one station, if present.
    pub fn get(&self, station_id: i64) -> Option<Station> {
        self.lock().iter().find(|s| s.id == station_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
