/// Local snapshot store.
///
/// One pretty-printed JSON document per saved station:
///
/// ```text
/// {
///   "station": {
///     "id": 114, "stationName": "...", "city": "...", "region": "...",
///     "lat": 51.11, "lon": 17.14,
///     "history": [18.4, ...],
///     "sensors": { "642": { "name": "dwutlenek azotu", "values": [15.3, ...] } }
///   },
///   "dates": ["2024-03-05 13", ...]
/// }
/// ```
///
/// Only values are persisted, never their timestamps. Loading is forgiving:
/// a missing or unreadable file is an expected outcome and yields `None`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::reconcile;
use crate::ingest::gios::GiosClient;
use crate::logging::{self, DataSource};
use crate::model::{AqError, Station};

const SNAPSHOT_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// File schema
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    station: StationRecord,
    #[serde(default)]
    dates: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StationRecord {
    id: i64,
    #[serde(rename = "stationName")]
    name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    region: String,
    #[serde(default, deserialize_with = "coordinate_or_zero")]
    lat: f64,
    #[serde(default, deserialize_with = "coordinate_or_zero")]
    lon: f64,
    #[serde(default)]
    history: Vec<f64>,
    /// Keys are written as JSON strings.
    #[serde(default)]
    sensors: BTreeMap<i64, SensorRecord>,
}

/// JSON has no NaN; a `null` coordinate reads as unknown.
fn coordinate_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Serialize, Deserialize)]
struct SensorRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    values: Vec<f64>,
}

/// A station restored from disk together with its dates log.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub dates: Vec<String>,
    pub station: Station,
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// `dir/filename`, with `.json` appended when the name lacks it.
pub fn snapshot_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = filename.trim();
    if filename.ends_with(".json") {
        dir.join(filename)
    } else {
        dir.join(format!("{}.{}", filename, SNAPSHOT_EXTENSION))
    }
}

/// `station_<id>_<YYYYmmdd_HHMMSS>.json`
pub fn default_snapshot_name(station_id: i64, now: NaiveDateTime) -> String {
    format!("station_{}_{}.json", station_id, now.format("%Y%m%d_%H%M%S"))
}

/// Names of the `.json` files in `dir`, sorted. A missing directory is empty.
pub fn list_snapshots(dir: &Path) -> Result<Vec<String>, AqError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| AqError::Persistence(format!("cannot list {}: {}", dir.display(), e)))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION))
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn to_record(station: &Station, mut values_for: impl FnMut(i64) -> Vec<f64>) -> StationRecord {
    let sensor_ids: std::collections::BTreeSet<i64> = station
        .sensor_names
        .keys()
        .chain(station.sensor_history.keys())
        .copied()
        .collect();

    let sensors = sensor_ids
        .into_iter()
        .map(|id| {
            let name = station.sensor_names.get(&id).cloned().unwrap_or_default();
            let values = match station.sensor_history.get(&id) {
                Some(values) if !values.is_empty() => values.clone(),
                _ => values_for(id),
            };
            (id, SensorRecord { name, values })
        })
        .collect();

    StationRecord {
        id: station.id,
        name: station.name.clone(),
        city: station.city.clone(),
        region: station.region.clone(),
        lat: finite_or_zero(station.latitude),
        lon: finite_or_zero(station.longitude),
        history: station.history.clone(),
        sensors,
    }
}

fn from_record(record: StationRecord) -> Station {
    let mut station = Station {
        id: record.id,
        name: record.name,
        city: record.city,
        region: record.region,
        latitude: record.lat,
        longitude: record.lon,
        history: record.history,
        ..Station::default()
    };

    for (id, sensor) in record.sensors {
        // An unnamed sensor was saved with an empty name.
        if !sensor.name.is_empty() {
            station.sensor_names.insert(id, sensor.name);
        }
        station.sensor_history.insert(id, sensor.values);
    }
    station
}

/// Serialises a snapshot without touching the network. Sensors without
/// in-memory history are written with an empty series.
pub fn encode_snapshot(dates: &[String], station: &Station) -> Result<String, AqError> {
    let file = SnapshotFile {
        station: to_record(station, |_| Vec::new()),
        dates: dates.to_vec(),
    };
    serde_json::to_string_pretty(&file)
        .map_err(|e| AqError::Persistence(format!("failed to encode snapshot: {}", e)))
}

/// Parses a snapshot document.
pub fn decode_snapshot(contents: &str) -> Result<Snapshot, AqError> {
    let file: SnapshotFile = serde_json::from_str(contents)
        .map_err(|e| AqError::Persistence(format!("failed to decode snapshot: {}", e)))?;
    Ok(Snapshot {
        dates: file.dates,
        station: from_record(file.station),
    })
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

/// Best-effort series for a sensor that has nothing in memory yet.
fn fetch_missing_values(gateway: &GiosClient, sensor_id: i64, retention_window: usize) -> Vec<f64> {
    match gateway.fetch_measurements(sensor_id) {
        Ok(series) => reconcile::clean_series(&series.values, retention_window)
            .into_iter()
            .map(|m| m.value)
            .collect(),
        Err(e) => {
            logging::log_failure(
                DataSource::Cache,
                Some(&sensor_id.to_string()),
                "Fill empty sensor history before save",
                &e,
            );
            Vec::new()
        }
    }
}

/// Writes `station` and `dates` to `dir/filename`, creating `dir` if needed.
///
/// When `gateway` is given, sensors with no in-memory history are filled
/// from the remote service first; a failed fill writes an empty series for
/// that sensor and the save goes on.
///
/// # Errors
/// - `AqError::Persistence` — directory creation, encoding or the write failed.
pub fn save(
    dir: &Path,
    filename: &str,
    dates: &[String],
    station: &Station,
    gateway: Option<&GiosClient>,
    retention_window: usize,
) -> Result<PathBuf, AqError> {
    fs::create_dir_all(dir)
        .map_err(|e| AqError::Persistence(format!("cannot create {}: {}", dir.display(), e)))?;

    let record = to_record(station, |sensor_id| match gateway {
        Some(gateway) => fetch_missing_values(gateway, sensor_id, retention_window),
        None => Vec::new(),
    });

    let file = SnapshotFile {
        station: record,
        dates: dates.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| AqError::Persistence(format!("failed to encode snapshot: {}", e)))?;

    let path = snapshot_path(dir, filename);
    fs::write(&path, json)
        .map_err(|e| AqError::Persistence(format!("cannot write {}: {}", path.display(), e)))?;

    tracing::info!("Saved station {} to {}", station.id, path.display());
    Ok(path)
}

/// Reads `dir/filename` back. Absence and parse failures both yield `None`.
pub fn load(dir: &Path, filename: &str) -> Option<Snapshot> {
    let path = snapshot_path(dir, filename);
    if !path.exists() {
        tracing::debug!("No snapshot at {}", path.display());
        return None;
    }

    let result = fs::read_to_string(&path)
        .map_err(|e| AqError::Persistence(format!("cannot read {}: {}", path.display(), e)))
        .and_then(|contents| decode_snapshot(&contents));

    match result {
        Ok(snapshot) => {
            tracing::info!(
                "Loaded station {} ({} dates) from {}",
                snapshot.station.id,
                snapshot.dates.len(),
                path.display()
            );
            Some(snapshot)
        }
        Err(e) => {
            logging::log_failure(DataSource::Cache, Some(filename), "Load snapshot", &e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
