/// aqmon_service: air quality station browser with offline snapshots.
///
/// # Module structure
///
/// ```text
/// aqmon_service
/// ├── model       — shared data types (Station, Sensor, Measurement, Analysis, AqError)
/// ├── config      — service configuration loader (aqmon.toml)
/// ├── logging     — tracing setup, failure classification, skipped-record log
/// ├── ingest
/// │   ├── transport — Fetch / ConnectivityProbe traits and their reqwest/TCP impls
/// │   ├── gios      — GIOS REST API: URL construction + JSON parsing
/// │   ├── geocode   — Nominatim address lookup
/// │   └── fixtures (test only) — representative API response payloads
/// ├── stations    — haversine/city filters and the shared station collection
/// ├── analysis
/// │   ├── reconcile — folds fetched series into the station model
/// │   └── stats     — min/max/average/trend
/// ├── cache       — per-station JSON snapshots
/// ├── worker      — single-flight background station fetches
/// └── session     — online/offline session context tying it all together
/// ```

/// Public modules
pub mod analysis;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod session;
pub mod stations;
pub mod worker;
