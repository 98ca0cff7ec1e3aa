/// GIOS air quality REST API client.
///
/// Handles URL construction and JSON response parsing for the three
/// endpoints the service consumes:
///   {base}/station/findAll         — every monitoring station
///   {base}/station/sensors/{id}    — sensors of one station
///   {base}/data/getData/{id}       — recent measurements of one sensor
///
/// Bulk lists are parsed leniently: a record that cannot be understood is
/// skipped and written to the error log, and only envelope-level problems
/// (not JSON, not an array) fail the call. Measurement payloads are parsed
/// strictly: one bad element rejects the whole response.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::sync::Arc;

use crate::ingest::geocode::Geocoder;
use crate::ingest::transport::Fetch;
use crate::logging::{DataSource, ErrorLog};
use crate::model::{AqError, MeasurementSeries, NoDataKind, RawMeasurement, Sensor, Station};
use crate::stations;

/// Sensor label used when the `param` object has no usable `paramName`.
pub const UNKNOWN_SENSOR_NAME: &str = "Unknown sensor";

/// Sensor label used when the entry carries no `param` object at all.
pub const MISSING_PARAM_NAME: &str = "No data";

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

pub fn build_station_list_url(base_url: &str) -> String {
    format!("{}/station/findAll", base_url.trim_end_matches('/'))
}

pub fn build_sensor_list_url(base_url: &str, station_id: i64) -> String {
    format!("{}/station/sensors/{}", base_url.trim_end_matches('/'), station_id)
}

pub fn build_measurement_url(base_url: &str, sensor_id: i64) -> String {
    format!("{}/data/getData/{}", base_url.trim_end_matches('/'), sensor_id)
}

// ---------------------------------------------------------------------------
// Serde structures for GIOS JSON deserialization
// ---------------------------------------------------------------------------
//
// Bulk-list records use `lenient` on every field: a field of the wrong type
// reads as absent instead of failing the record, so only the explicit
// required-field checks below decide whether a record is skipped.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    /// Non-finite and unparseable values read as unknown.
    fn degrees(&self) -> Option<f64> {
        let value = match self {
            Coordinate::Number(v) => *v,
            Coordinate::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Deserialize)]
struct StationDto {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<Number>,
    #[serde(rename = "stationName", default, deserialize_with = "lenient")]
    station_name: Option<String>,
    #[serde(rename = "gegrLat", default, deserialize_with = "lenient")]
    gegr_lat: Option<Coordinate>,
    #[serde(rename = "gegrLon", default, deserialize_with = "lenient")]
    gegr_lon: Option<Coordinate>,
    #[serde(default, deserialize_with = "lenient")]
    city: Option<CityDto>,
}

#[derive(Deserialize)]
struct CityDto {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    commune: Option<CommuneDto>,
}

#[derive(Deserialize)]
struct CommuneDto {
    #[serde(rename = "provinceName", default, deserialize_with = "lenient")]
    province_name: Option<String>,
}

#[derive(Deserialize)]
struct SensorDto {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<Number>,
    #[serde(default, deserialize_with = "lenient")]
    param: Option<ParamDto>,
}

#[derive(Deserialize)]
struct ParamDto {
    #[serde(rename = "paramName", default, deserialize_with = "lenient")]
    param_name: Option<String>,
}

#[derive(Deserialize)]
struct MeasurementsDto {
    key: String,
    values: Vec<Value>,
}

#[derive(Deserialize)]
struct ValueEntry {
    date: String,
    /// Required, but may be `null`.
    #[serde(deserialize_with = "number_or_null")]
    value: Option<f64>,
}

fn number_or_null<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn parse_envelope(body: &[u8]) -> Result<Value, AqError> {
    serde_json::from_slice(body)
        .map_err(|e| AqError::MalformedResponse(format!("JSON deserialization failed: {}", e)))
}

fn parse_records(body: &[u8], what: &str) -> Result<Vec<Value>, AqError> {
    match parse_envelope(body)? {
        Value::Array(records) => Ok(records),
        _ => Err(AqError::MalformedResponse(format!("expected an array of {}", what))),
    }
}

/// Ids are integers, but some mirrors send them as `642.0`.
fn integral_id(number: &Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|v| v.fract() == 0.0 && v.abs() <= i64::MAX as f64)
            .map(|v| v as i64)
    })
}

/// Builds a `Station` from one element of the station list, or explains
/// why the element has to be skipped.
fn parse_station_record(record: Value) -> Result<Station, String> {
    let dto: StationDto =
        serde_json::from_value(record).map_err(|e| format!("unreadable record: {}", e))?;

    let id = dto
        .id
        .as_ref()
        .and_then(integral_id)
        .ok_or_else(|| "missing or non-integer 'id'".to_string())?;

    let name = dto
        .station_name
        .ok_or_else(|| format!("station {}: missing or non-string 'stationName'", id))?;

    let (city, region) = match dto.city {
        Some(city) => (
            city.name.unwrap_or_default(),
            city.commune
                .and_then(|c| c.province_name)
                .unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };

    Ok(Station {
        id,
        name,
        city,
        region,
        latitude: dto.gegr_lat.and_then(|c| c.degrees()).unwrap_or(0.0),
        longitude: dto.gegr_lon.and_then(|c| c.degrees()).unwrap_or(0.0),
        ..Station::default()
    })
}

/// Parses the station list response.
///
/// Coordinates may be numbers or numeric strings; anything else, including
/// NaN and infinities, reads as `0.0`.
///
/// # Errors
/// - `AqError::MalformedResponse` — body is not JSON or not an array.
/// - `AqError::NoDataFound(Stations)` — no element survived validation.
pub fn parse_station_list(body: &[u8], error_log: Option<&ErrorLog>) -> Result<Vec<Station>, AqError> {
    let records = parse_records(body, "stations")?;

    let mut stations = Vec::with_capacity(records.len());
    for record in records {
        match parse_station_record(record) {
            Ok(station) => stations.push(station),
            Err(reason) => {
                tracing::warn!("Skipped station record: {}", reason);
                if let Some(log) = error_log {
                    log.record(DataSource::Gios, &format!("Skipped station: {}", reason));
                }
            }
        }
    }

    if stations.is_empty() {
        return Err(AqError::NoDataFound(NoDataKind::Stations));
    }

    Ok(stations)
}

/// Parses the sensor list response of one station.
///
/// Entries without a numeric `id` are skipped; entries without a parameter
/// name get a placeholder label.
///
/// # Errors
/// - `AqError::MalformedResponse` — body is not JSON or not an array.
/// - `AqError::NoDataFound(Sensors)` — no entry had a usable id.
pub fn parse_sensor_list(body: &[u8]) -> Result<Vec<Sensor>, AqError> {
    let records = parse_records(body, "sensors")?;

    let mut sensors = Vec::new();
    for record in records {
        let Ok(dto) = serde_json::from_value::<SensorDto>(record) else {
            tracing::debug!("Skipped unreadable sensor entry");
            continue;
        };
        let Some(id) = dto.id.as_ref().and_then(integral_id) else {
            tracing::debug!("Skipped sensor entry without numeric id");
            continue;
        };

        let name = match dto.param {
            Some(param) => param
                .param_name
                .unwrap_or_else(|| UNKNOWN_SENSOR_NAME.to_string()),
            None => MISSING_PARAM_NAME.to_string(),
        };

        sensors.push(Sensor { id, name });
    }

    if sensors.is_empty() {
        return Err(AqError::NoDataFound(NoDataKind::Sensors));
    }

    Ok(sensors)
}

/// Parses and strictly validates a measurement response.
///
/// Every element of `values` must carry a string `date` and a `value` that is
/// a number or `null`. Validation covers the whole array before anything is
/// returned.
///
/// # Errors
/// - `AqError::MalformedResponse` — any structural defect anywhere.
pub fn parse_measurements(body: &[u8]) -> Result<MeasurementSeries, AqError> {
    let envelope: MeasurementsDto = serde_json::from_value(parse_envelope(body)?)
        .map_err(|e| AqError::MalformedResponse(format!("invalid measurement envelope: {}", e)))?;

    let mut values = Vec::with_capacity(envelope.values.len());
    for (index, entry) in envelope.values.into_iter().enumerate() {
        let entry: ValueEntry = serde_json::from_value(entry)
            .map_err(|e| AqError::MalformedResponse(format!("values[{}]: {}", index, e)))?;
        values.push(RawMeasurement {
            date: entry.date,
            value: entry.value,
        });
    }

    Ok(MeasurementSeries {
        key: envelope.key,
        values,
    })
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

/// Remote data gateway bound to one transport and base URL.
#[derive(Clone)]
pub struct GiosClient {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
    error_log: Option<ErrorLog>,
}

impl GiosClient {
    pub fn new(fetcher: Arc<dyn Fetch>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            error_log: None,
        }
    }

    /// Records skipped station records and failed station fetches in `log`.
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.error_log = Some(log);
        self
    }

    /// Fetches and leniently parses every station.
    pub fn fetch_all_stations(&self) -> Result<Vec<Station>, AqError> {
        let url = build_station_list_url(&self.base_url);
        let result = self
            .fetcher
            .get(&url)
            .and_then(|body| parse_station_list(&body, self.error_log.as_ref()));

        match &result {
            Ok(stations) => tracing::info!("Fetched {} stations", stations.len()),
            Err(e) => {
                if let Some(log) = &self.error_log {
                    log.record(DataSource::Gios, &format!("Station list fetch failed: {}", e));
                }
            }
        }
        result
    }

    /// Stations whose city equals `city`, ignoring case.
    pub fn fetch_by_city(&self, city: &str) -> Result<Vec<Station>, AqError> {
        let all = self.fetch_all_stations()?;
        Ok(stations::filter_by_city(all, city))
    }

    /// Stations within `radius_km` of the geocoded `address`.
    pub fn fetch_by_radius(
        &self,
        geocoder: &Geocoder,
        address: &str,
        radius_km: f64,
    ) -> Result<Vec<Station>, AqError> {
        let center = geocoder.geocode(address)?;
        let all = self.fetch_all_stations()?;
        Ok(stations::filter_by_radius(all, center, radius_km))
    }

    pub fn fetch_sensors(&self, station_id: i64) -> Result<Vec<Sensor>, AqError> {
        let url = build_sensor_list_url(&self.base_url, station_id);
        let body = self.fetcher.get(&url)?;
        parse_sensor_list(&body)
    }

    pub fn fetch_measurements(&self, sensor_id: i64) -> Result<MeasurementSeries, AqError> {
        let url = build_measurement_url(&self.base_url, sensor_id);
        let body = self.fetcher.get(&url)?;
        parse_measurements(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;

    // --- URL construction ---------------------------------------------------

    #[test]
    fn test_build_urls_target_rest_paths() {
        let base = "https://api.gios.gov.pl/pjp-api/rest";
        assert_eq!(
            build_station_list_url(base),
            "https://api.gios.gov.pl/pjp-api/rest/station/findAll"
        );
        assert_eq!(
            build_sensor_list_url(base, 114),
            "https://api.gios.gov.pl/pjp-api/rest/station/sensors/114"
        );
        assert_eq!(
            build_measurement_url(base, 642),
            "https://api.gios.gov.pl/pjp-api/rest/data/getData/642"
        );
    }

    #[test]
    fn test_build_urls_tolerate_trailing_slash() {
        assert_eq!(
            build_station_list_url("http://localhost/rest/"),
            "http://localhost/rest/station/findAll"
        );
    }

    // --- Station list -------------------------------------------------------

    #[test]
    fn test_parse_station_list_reads_nested_city_and_region() {
        let stations = parse_station_list(fixture_station_list_json().as_bytes(), None)
            .expect("fixture should parse");

        let wroclaw = stations
            .iter()
            .find(|s| s.id == 114)
            .expect("station 114 should be present");
        assert_eq!(wroclaw.name, "Wrocław - Bartnicza");
        assert_eq!(wroclaw.city, "Wrocław");
        assert_eq!(wroclaw.region, "DOLNOŚLĄSKIE");
        assert!((wroclaw.latitude - 51.115933).abs() < 1e-9);
        assert!((wroclaw.longitude - 17.141125).abs() < 1e-9);
    }

    #[test]
    fn test_parse_station_list_accepts_numeric_coordinates() {
        let stations = parse_station_list(fixture_station_list_json().as_bytes(), None)
            .expect("fixture should parse");
        let krakow = stations.iter().find(|s| s.id == 400).expect("station 400");
        assert!((krakow.latitude - 50.057678).abs() < 1e-9);
        assert!((krakow.longitude - 19.926189).abs() < 1e-9);
    }

    #[test]
    fn test_parse_station_list_defaults_optional_fields() {
        let stations = parse_station_list(fixture_station_list_json().as_bytes(), None)
            .expect("fixture should parse");
        let bare = stations.iter().find(|s| s.id == 500).expect("station 500");
        assert_eq!(bare.city, "");
        assert_eq!(bare.region, "");
        assert_eq!(bare.latitude, 0.0, "unparseable coordinate defaults to 0");
        assert_eq!(bare.longitude, 0.0, "absent coordinate defaults to 0");
        assert!(bare.history.is_empty());
        assert!(bare.sensor_names.is_empty());
    }

    #[test]
    fn test_parse_station_list_skips_records_missing_required_fields() {
        let stations = parse_station_list(fixture_station_list_json().as_bytes(), None)
            .expect("fixture should parse");
        let ids: Vec<i64> = stations.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![114, 400, 500, 501], "records without id/stationName must be skipped");
    }

    #[test]
    fn test_parse_station_list_non_finite_coordinates_default_to_zero() {
        let stations = parse_station_list(fixture_station_list_json().as_bytes(), None)
            .expect("fixture should parse");
        let rig = stations.iter().find(|s| s.id == 501).expect("float id 501.0 accepted");
        assert_eq!(rig.latitude, 0.0, "\"NaN\" is not a coordinate");
        assert_eq!(rig.longitude, 0.0, "\"inf\" is not a coordinate");
        assert!(!rig.has_coordinates());
        assert_eq!(rig.city, "", "a city that is not an object is ignored");
    }

    #[test]
    fn test_parse_station_list_numeric_non_finite_strings() {
        let body = br#"[{"id": 1, "stationName": "x", "gegrLat": "infinity", "gegrLon": "-inf"}]"#;
        let stations = parse_station_list(body, None).expect("record is valid");
        assert!(stations[0].latitude.is_finite());
        assert!(stations[0].longitude.is_finite());
    }

    #[test]
    fn test_parse_station_list_writes_skips_to_error_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = ErrorLog::new(dir.path().join("error_log.txt"));

        parse_station_list(fixture_station_list_json().as_bytes(), Some(&log))
            .expect("fixture should parse");

        let contents = std::fs::read_to_string(log.path()).expect("error log written");
        assert_eq!(contents.lines().count(), 2, "one line per skipped record");
        assert!(contents.contains("Skipped station"));
    }

    #[test]
    fn test_parse_station_list_empty_array_is_no_data() {
        let result = parse_station_list(b"[]", None);
        assert!(matches!(result, Err(AqError::NoDataFound(NoDataKind::Stations))));
    }

    #[test]
    fn test_parse_station_list_all_invalid_is_no_data() {
        let result = parse_station_list(br#"[{"stationName": "x"}, {"id": "7"}]"#, None);
        assert!(matches!(result, Err(AqError::NoDataFound(NoDataKind::Stations))));
    }

    #[test]
    fn test_parse_station_list_non_array_is_malformed() {
        let result = parse_station_list(br#"{"error": "maintenance"}"#, None);
        assert!(matches!(result, Err(AqError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_station_list_invalid_json_is_malformed() {
        let result = parse_station_list(b"<html>502 Bad Gateway</html>", None);
        assert!(matches!(result, Err(AqError::MalformedResponse(_))));
    }

    // --- Sensor list --------------------------------------------------------

    #[test]
    fn test_parse_sensor_list_reads_param_names() {
        let sensors = parse_sensor_list(fixture_sensor_list_json().as_bytes())
            .expect("fixture should parse");
        assert_eq!(sensors[0], Sensor { id: 642, name: "dwutlenek azotu".to_string() });
        assert_eq!(sensors[1], Sensor { id: 644, name: "pył zawieszony PM10".to_string() });
    }

    #[test]
    fn test_parse_sensor_list_placeholder_names() {
        let sensors = parse_sensor_list(fixture_sensor_list_json().as_bytes())
            .expect("fixture should parse");
        let unnamed = sensors.iter().find(|s| s.id == 650).expect("sensor 650");
        assert_eq!(unnamed.name, UNKNOWN_SENSOR_NAME);
        let no_param = sensors.iter().find(|s| s.id == 651).expect("sensor 651");
        assert_eq!(no_param.name, MISSING_PARAM_NAME);
    }

    #[test]
    fn test_parse_sensor_list_skips_entries_without_numeric_id() {
        let sensors = parse_sensor_list(fixture_sensor_list_json().as_bytes())
            .expect("fixture should parse");
        let ids: Vec<i64> = sensors.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![642, 644, 650, 651, 653]);
    }

    #[test]
    fn test_parse_sensor_list_accepts_integral_float_ids() {
        let sensors = parse_sensor_list(fixture_sensor_list_json().as_bytes())
            .expect("fixture should parse");
        let ozone = sensors.iter().find(|s| s.id == 653).expect("653.0 read as 653");
        assert_eq!(ozone.name, "ozon");
        assert!(sensors.iter().all(|s| s.name != "benzo(a)piren"), "654.5 is not an id");
    }

    #[test]
    fn test_parse_sensor_list_empty_is_no_data() {
        let result = parse_sensor_list(br#"[{"param": {"paramName": "x"}}]"#);
        assert!(matches!(result, Err(AqError::NoDataFound(NoDataKind::Sensors))));
    }

    #[test]
    fn test_parse_sensor_list_non_array_is_malformed() {
        let result = parse_sensor_list(br#"{"id": 1}"#);
        assert!(matches!(result, Err(AqError::MalformedResponse(_))));
    }

    // --- Measurements -------------------------------------------------------

    #[test]
    fn test_parse_measurements_keeps_nulls_for_reconciliation() {
        let series = parse_measurements(fixture_measurements_json().as_bytes())
            .expect("fixture should parse");
        assert_eq!(series.key, "NO2");
        assert_eq!(series.values.len(), 5);
        assert_eq!(series.values[0].date, "2024-03-05 14:00:00");
        assert_eq!(series.values[0].value, None);
        assert_eq!(series.values[1].value, Some(21.7));
    }

    #[test]
    fn test_parse_measurements_single_bad_element_rejects_all() {
        let result = parse_measurements(fixture_measurements_bad_value_json().as_bytes());
        assert!(
            matches!(result, Err(AqError::MalformedResponse(_))),
            "a string value anywhere must invalidate the fetch, got {:?}",
            result
        );
    }

    #[test]
    fn test_parse_measurements_missing_date_rejects_all() {
        let json = r#"{"key": "PM10", "values": [
            {"date": "2024-03-05 13:00:00", "value": 1.0},
            {"value": 2.0}
        ]}"#;
        assert!(matches!(
            parse_measurements(json.as_bytes()),
            Err(AqError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_measurements_missing_value_key_rejects_all() {
        let json = r#"{"key": "PM10", "values": [{"date": "2024-03-05 13:00:00"}]}"#;
        assert!(matches!(
            parse_measurements(json.as_bytes()),
            Err(AqError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_measurements_missing_values_array() {
        let result = parse_measurements(br#"{"key": "PM10"}"#);
        assert!(matches!(result, Err(AqError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_measurements_empty_values_is_valid() {
        let series = parse_measurements(br#"{"key": "O3", "values": []}"#)
            .expect("an empty array is structurally valid");
        assert!(series.values.is_empty());
    }
}
