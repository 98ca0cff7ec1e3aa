/// History reconciliation: folds a freshly fetched measurement series for
/// one sensor into the live station model.
///
/// One cycle:
/// 1. drop entries with a null value or an unparseable timestamp,
/// 2. sort the survivors by timestamp, oldest first,
/// 3. keep the most recent `retention_window` points,
/// 4. overwrite the sensor's stored value series with them,
/// 5. append their mean to the station's aggregate `history`,
/// 6. append the latest point's timestamp, truncated to the hour, to the
///    session's `dates` log.
///
/// A series with nothing left after step 1 aborts the cycle before any state
/// is touched.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::model::{AqError, Measurement, NoDataKind, RawMeasurement, Station};

/// Format of the `date` field in remote measurement payloads.
pub const SOURCE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of entries appended to the session's `dates` log.
pub const DATE_LOG_FORMAT: &str = "%Y-%m-%d %H";

/// Parses a source-local timestamp, treating it as UTC for ordering.
pub fn parse_source_time(date: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(date.trim(), SOURCE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Steps 1–3: valid points, ascending by time, at most `retention_window`
/// of the most recent ones.
pub fn clean_series(raw: &[RawMeasurement], retention_window: usize) -> Vec<Measurement> {
    let mut series: Vec<Measurement> = raw
        .iter()
        .filter_map(|entry| {
            let value = entry.value?;
            let timestamp = parse_source_time(&entry.date)?;
            Some(Measurement { timestamp, value })
        })
        .collect();

    series.sort_by_key(|m| m.timestamp);

    if series.len() > retention_window {
        series.drain(..series.len() - retention_window);
    }
    series
}

/// Outcome of one completed reconciliation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The retained series, oldest first.
    pub series: Vec<Measurement>,
    /// The point appended to the station's aggregate history.
    pub aggregate: f64,
    /// The entry appended to the dates log.
    pub date_label: String,
}

/// Runs one reconciliation cycle for `sensor_id` of `station`.
///
/// # Errors
/// - `AqError::NoDataFound(Measurements)` — no valid entry; `station` and
///   `dates` are left untouched.
pub fn reconcile(
    station: &mut Station,
    dates: &mut Vec<String>,
    sensor_id: i64,
    raw: &[RawMeasurement],
    retention_window: usize,
) -> Result<Reconciliation, AqError> {
    let series = clean_series(raw, retention_window);

    let Some(latest) = series.last() else {
        return Err(AqError::NoDataFound(NoDataKind::Measurements));
    };

    let aggregate = series.iter().map(|m| m.value).sum::<f64>() / series.len() as f64;
    let date_label = latest.timestamp.format(DATE_LOG_FORMAT).to_string();

    station
        .sensor_history
        .insert(sensor_id, series.iter().map(|m| m.value).collect());
    station.history.push(aggregate);
    dates.push(date_label.clone());

    tracing::debug!(
        "Reconciled sensor {} of station {}: {} points, aggregate {:.2}",
        sensor_id,
        station.id,
        series.len(),
        aggregate
    );

    Ok(Reconciliation {
        series,
        aggregate,
        date_label,
    })
}

/// Rebuilds a plottable series from persisted values, which carry no
/// timestamps: the value at index `i` is stamped `now − 24h × i`.
pub fn replay_history(values: &[f64], now: DateTime<Utc>) -> Vec<Measurement> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| Measurement {
            timestamp: now - Duration::hours(24 * i as i64),
            value,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
