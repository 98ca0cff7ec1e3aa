/// Nominatim geocoding client.
///
/// Resolves a free-text address to WGS84 coordinates with a single search
/// request limited to one result:
///   {geocode_url}?q=<address>&format=json&limit=1

use serde_json::Value;
use std::sync::Arc;

use crate::ingest::transport::Fetch;
use crate::logging::{self, DataSource};
use crate::model::AqError;

/// Builds the search URL, percent-encoding the address.
pub fn build_geocode_url(geocode_url: &str, address: &str) -> String {
    format!(
        "{}?q={}&format=json&limit=1",
        geocode_url,
        urlencoding::encode(address)
    )
}

/// Extracts `(lat, lon)` from the first search hit.
///
/// # Errors
/// - `AqError::GeocodeFailed` — no hits, unexpected shape, or coordinates
///   that are not numeric strings.
pub fn parse_geocode_response(body: &[u8]) -> Result<(f64, f64), AqError> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| AqError::GeocodeFailed(format!("JSON deserialization failed: {}", e)))?;

    let first = envelope
        .as_array()
        .and_then(|hits| hits.first())
        .ok_or_else(|| AqError::GeocodeFailed("no results".to_string()))?;

    let coordinate = |field: &str| -> Result<f64, AqError> {
        first
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| AqError::GeocodeFailed(format!("missing or invalid '{}'", field)))
    };

    Ok((coordinate("lat")?, coordinate("lon")?))
}

#[derive(Clone)]
pub struct Geocoder {
    fetcher: Arc<dyn Fetch>,
    geocode_url: String,
}

impl Geocoder {
    pub fn new(fetcher: Arc<dyn Fetch>, geocode_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            geocode_url: geocode_url.into(),
        }
    }

    /// Resolves `address` to `(latitude, longitude)`.
    ///
    /// Transport problems surface as `Transport`/`HttpStatus`, so the session
    /// can tell them apart from an address that simply was not found.
    pub fn geocode(&self, address: &str) -> Result<(f64, f64), AqError> {
        let url = build_geocode_url(&self.geocode_url, address);
        let result = self
            .fetcher
            .get(&url)
            .and_then(|body| parse_geocode_response(&body));

        match &result {
            Ok(position) => tracing::debug!("Geocoded '{}' to {:?}", address, position),
            Err(e) => logging::log_failure(DataSource::Geocoder, Some(address), "Geocode", e),
        }
        result
    }
}
