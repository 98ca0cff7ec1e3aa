/// Data ingestion from remote services.
///
/// Submodules:
/// - `transport` — the `Fetch` capability (reqwest blocking) and connectivity probe.
/// - `gios`      — GIOS REST API: URL construction + JSON parsing.
/// - `geocode`   — Nominatim address lookup.
/// - `fixtures`  — representative payloads (test only).

pub mod geocode;
pub mod gios;
pub mod transport;

#[cfg(test)]
pub(crate) mod fixtures;
