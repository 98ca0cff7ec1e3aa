/// Test fixtures: representative JSON payloads from the GIOS REST API and
/// the Nominatim geocoder.
///
/// Payloads are truncated to the minimum needed to exercise the parsers but
/// keep the real envelope shapes:
///
///   station/findAll       — array of { id, stationName, gegrLat, gegrLon,
///                            city: { name, commune: { provinceName } } }
///   station/sensors/{id}  — array of { id, stationId, param: { paramName, paramCode } }
///   data/getData/{id}     — { key, values: [ { date, value|null } ] }, newest first
///   nominatim /search     — array of { lat, lon, display_name } with string coordinates
///
/// Note: GIOS encodes station coordinates as strings on most records, but
/// some mirrors return numbers. Parsers must accept both.

/// Six stations: four valid (string coordinates, numeric coordinates, no
/// city and garbage coordinates, float id with non-finite coordinates and a
/// bare-string city) and two that must be skipped (no id, no name).
#[cfg(test)]
pub(crate) fn fixture_station_list_json() -> &'static str {
    r#"[
      {
        "id": 114,
        "stationName": "Wrocław - Bartnicza",
        "gegrLat": "51.115933",
        "gegrLon": "17.141125",
        "city": {
          "id": 1064,
          "name": "Wrocław",
          "commune": {
            "communeName": "Wrocław",
            "districtName": "Wrocław",
            "provinceName": "DOLNOŚLĄSKIE"
          }
        },
        "addressStreet": "ul. Bartnicza"
      },
      {
        "id": 400,
        "stationName": "Kraków, Aleja Krasińskiego",
        "gegrLat": 50.057678,
        "gegrLon": 19.926189,
        "city": {
          "id": 415,
          "name": "Kraków",
          "commune": { "provinceName": "MAŁOPOLSKIE" }
        }
      },
      {
        "stationName": "Record without an id",
        "gegrLat": "52.0",
        "gegrLon": "21.0"
      },
      {
        "id": 401,
        "gegrLat": "50.0",
        "gegrLon": "19.0",
        "city": { "name": "Kraków" }
      },
      {
        "id": 500,
        "stationName": "Portable unit",
        "gegrLat": "n/a"
      },
      {
        "id": 501.0,
        "stationName": "Test rig",
        "gegrLat": "NaN",
        "gegrLon": "inf",
        "city": "Wrocław"
      }
    ]"#
}

/// Sensors of station 114, including entries with missing names, string
/// and fractional ids, and an integral id sent as a float.
#[cfg(test)]
pub(crate) fn fixture_sensor_list_json() -> &'static str {
    r#"[
      {
        "id": 642,
        "stationId": 114,
        "param": { "paramName": "dwutlenek azotu", "paramFormula": "NO2", "paramCode": "NO2", "idParam": 6 }
      },
      {
        "id": 644,
        "stationId": 114,
        "param": { "paramName": "pył zawieszony PM10", "paramFormula": "PM10", "paramCode": "PM10", "idParam": 3 }
      },
      {
        "id": 650,
        "stationId": 114,
        "param": { "paramCode": "O3" }
      },
      {
        "id": 651,
        "stationId": 114
      },
      {
        "id": "652",
        "stationId": 114,
        "param": { "paramName": "benzen" }
      },
      {
        "stationId": 114,
        "param": { "paramName": "tlenek węgla" }
      },
      {
        "id": 653.0,
        "stationId": 114,
        "param": { "paramName": "ozon" }
      },
      {
        "id": 654.5,
        "stationId": 114,
        "param": { "paramName": "benzo(a)piren" }
      }
    ]"#
}

/// NO2 readings, newest first, with two null values.
/// Valid points: 10:00 → 15.3, 12:00 → 18.2, 13:00 → 21.7 (mean 18.4).
#[cfg(test)]
pub(crate) fn fixture_measurements_json() -> &'static str {
    r#"{
      "key": "NO2",
      "values": [
        { "date": "2024-03-05 14:00:00", "value": null },
        { "date": "2024-03-05 13:00:00", "value": 21.7 },
        { "date": "2024-03-05 12:00:00", "value": 18.2 },
        { "date": "2024-03-05 11:00:00", "value": null },
        { "date": "2024-03-05 10:00:00", "value": 15.3 }
      ]
    }"#
}

/// A single element carries a string value, which must reject the payload.
#[cfg(test)]
pub(crate) fn fixture_measurements_bad_value_json() -> &'static str {
    r#"{
      "key": "PM10",
      "values": [
        { "date": "2024-03-05 14:00:00", "value": 40.1 },
        { "date": "2024-03-05 13:00:00", "value": "38.0" },
        { "date": "2024-03-05 12:00:00", "value": 35.9 }
      ]
    }"#
}

/// One Nominatim hit for central Wrocław.
#[cfg(test)]
pub(crate) fn fixture_geocode_json() -> &'static str {
    r#"[
      {
        "place_id": 130429871,
        "lat": "51.1089776",
        "lon": "17.0326689",
        "display_name": "Rynek, Stare Miasto, Wrocław, województwo dolnośląskie, Polska",
        "class": "highway",
        "type": "pedestrian"
      }
    ]"#
}
