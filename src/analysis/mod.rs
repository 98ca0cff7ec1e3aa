/// Measurement processing for the air quality monitoring service.
///
/// Submodules:
/// - `reconcile` — folds freshly fetched sensor series into the station model.
/// - `stats`     — min/max/average/trend over a time-ordered series.

pub mod reconcile;
pub mod stats;
