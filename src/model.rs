/// Core data types for the air quality monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// stations, sensors, measurements, the derived analysis summary and the
/// error taxonomy. It contains no I/O.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Station and sensor types
// ---------------------------------------------------------------------------

/// A fixed monitoring location together with the history accumulated for it
/// during the session.
///
/// `latitude`/`longitude` of `0.0` mean "unknown". `history` holds one
/// aggregate point per completed reconciliation cycle, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub history: Vec<f64>,
    /// sensor id → retained values, oldest first
    pub sensor_history: BTreeMap<i64, Vec<f64>>,
    /// sensor id → measured parameter name
    pub sensor_names: BTreeMap<i64, String>,
}

impl Station {
    /// Most recent aggregate value, or `0.0` before the first reconciliation.
    pub fn latest(&self) -> f64 {
        self.history.last().copied().unwrap_or(0.0)
    }

    /// True when the remote service supplied usable coordinates.
    pub fn has_coordinates(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }

    /// OpenStreetMap link centred on the station, if its position is known.
    pub fn map_url(&self) -> Option<String> {
        if !self.has_coordinates() {
            return None;
        }
        Some(format!(
            "https://www.openstreetmap.org/?mlat={lat:.6}&mlon={lon:.6}#map=12/{lat:.6}/{lon:.6}",
            lat = self.latitude,
            lon = self.longitude
        ))
    }
}

/// A single measured parameter stream belonging to a station.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Measurement types
// ---------------------------------------------------------------------------

/// One entry of the remote `values` array, exactly as validated.
///
/// `date` is the source-local `"YYYY-MM-DD HH:MM:SS"` string; `value` is
/// `None` when the service reported `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub date: String,
    pub value: Option<f64>,
}

/// Validated measurement payload for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    /// Parameter code reported by the service (e.g. "PM10").
    pub key: String,
    pub values: Vec<RawMeasurement>,
}

/// A measurement with a parsed timestamp and a present value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Descriptive statistics over a measurement series. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub min: f64,
    pub max: f64,
    /// Timestamp of the minimum, formatted `%Y-%m-%d %H:%M:%S`.
    pub min_time: String,
    /// Timestamp of the maximum, formatted `%Y-%m-%d %H:%M:%S`.
    pub max_time: String,
    pub avg: f64,
    /// Least-squares slope in units per sample (daily samples → units/day).
    pub trend: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Which kind of record came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataKind {
    Stations,
    Sensors,
    Measurements,
}

impl std::fmt::Display for NoDataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoDataKind::Stations => write!(f, "no stations found"),
            NoDataKind::Sensors => write!(f, "no sensors found"),
            NoDataKind::Measurements => write!(f, "no valid measurements"),
        }
    }
}

/// Errors that can arise while fetching, reconciling or persisting data.
#[derive(Debug, Error)]
pub enum AqError {
    /// Connection, DNS or TLS level failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    /// The payload failed structural validation.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Structurally valid but empty after filtering.
    #[error("No data: {0}")]
    NoDataFound(NoDataKind),

    /// Local snapshot read/write failure.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Geocoding failed: {0}")]
    GeocodeFailed(String),

    /// The station id is not present in the session's collection.
    #[error("Unknown station: {0}")]
    UnknownStation(i64),

    /// The sensor is not on the station's sensor list.
    #[error("Sensor {sensor_id} does not belong to station {station_id}")]
    UnknownSensor { station_id: i64, sensor_id: i64 },
}

impl AqError {
    /// True when the failure came from talking to the remote service.
    /// Only these switch a session to offline mode.
    pub fn is_network_origin(&self) -> bool {
        matches!(
            self,
            AqError::Transport(_) | AqError::HttpStatus(_) | AqError::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_is_zero_without_history() {
        let station = Station::default();
        assert_eq!(station.latest(), 0.0);
    }

    #[test]
    fn test_latest_returns_newest_aggregate() {
        let station = Station {
            history: vec![12.0, 15.5, 9.25],
            ..Station::default()
        };
        assert_eq!(station.latest(), 9.25);
    }

    #[test]
    fn test_map_url_requires_coordinates() {
        let mut station = Station::default();
        assert!(station.map_url().is_none(), "0/0 means unknown position");

        station.latitude = 52.2297;
        station.longitude = 21.0122;
        let url = station.map_url().expect("coordinates are known");
        assert!(url.contains("mlat=52.229700"));
        assert!(url.contains("mlon=21.012200"));
    }

    #[test]
    fn test_network_origin_classification() {
        assert!(AqError::Transport("reset".into()).is_network_origin());
        assert!(AqError::HttpStatus(503).is_network_origin());
        assert!(AqError::MalformedResponse("not an array".into()).is_network_origin());
        assert!(!AqError::NoDataFound(NoDataKind::Sensors).is_network_origin());
        assert!(!AqError::Persistence("disk full".into()).is_network_origin());
        assert!(!AqError::GeocodeFailed("no results".into()).is_network_origin());
        assert!(!AqError::UnknownSensor { station_id: 1, sensor_id: 2 }.is_network_origin());
    }

    #[test]
    fn test_unknown_sensor_display_names_both_ids() {
        let err = AqError::UnknownSensor { station_id: 114, sensor_id: 900 };
        assert_eq!(err.to_string(), "Sensor 900 does not belong to station 114");
    }

    #[test]
    fn test_no_data_display_names_the_kind() {
        let err = AqError::NoDataFound(NoDataKind::Measurements);
        assert_eq!(err.to_string(), "No data: no valid measurements");
    }
}
