/// Session context: the online/offline mode, the shared station collection,
/// the dates log and the background station fetcher, passed explicitly to
/// every operation instead of living in globals.
///
/// Mode rules:
/// - the initial mode comes from one connectivity probe,
/// - a failure whose origin is the network switches to offline,
/// - any successful remote call switches back to online,
/// - other failures (empty data, geocoding misses, local I/O) leave it alone.
///
/// While offline, sensor and history requests are answered from the station
/// model (loaded snapshots or earlier fetches) without touching the network.
/// Station-list requests always go to the network; they are how a session
/// finds its way back online.
///
/// Lock order: station collection, then dates log.

use chrono::{Local, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::{reconcile, stats};
use crate::cache;
use crate::config::AppConfig;
use crate::ingest::geocode::Geocoder;
use crate::ingest::gios::GiosClient;
use crate::ingest::transport::{ConnectivityProbe, Fetch, HttpFetcher, TcpProbe};
use crate::logging::{self, DataSource, ErrorLog};
use crate::model::{AqError, Analysis, Measurement, NoDataKind, Sensor, Station};
use crate::stations::StationCollection;
use crate::worker::StationFetchWorker;

// ---------------------------------------------------------------------------
// Request and result types
// ---------------------------------------------------------------------------

/// Which stations a background fetch should return.
#[derive(Debug, Clone, PartialEq)]
pub enum StationQuery {
    All,
    City(String),
    Radius { address: String, radius_km: f64 },
}

/// Where a series shown to the user came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrigin {
    /// Freshly fetched and reconciled; timestamps are real.
    Remote,
    /// Replayed from stored values; timestamps are synthetic.
    Cached,
}

/// A sensor series ready for display, with its analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub origin: SeriesOrigin,
    pub points: Vec<Measurement>,
    /// Computed over the most recent `retention_window` points.
    pub analysis: Analysis,
}

// ---------------------------------------------------------------------------
// Offline helpers
// ---------------------------------------------------------------------------

/// Sensors that can be served from `station` without the network: those with
/// stored values. Unnamed ones get a label built from the record count.
pub fn cached_sensors(station: &Station) -> Vec<Sensor> {
    station
        .sensor_history
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(&id, values)| {
            let name = match station.sensor_names.get(&id) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => format!("Sensor #{} ({} records)", id, values.len()),
            };
            Sensor { id, name }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    config: AppConfig,
    gateway: GiosClient,
    geocoder: Geocoder,
    stations: StationCollection,
    online: AtomicBool,
    dates: Mutex<Vec<String>>,
    worker: StationFetchWorker,
}

impl Session {
    /// Builds a session over `fetcher`; the initial mode comes from `probe`.
    pub fn new(config: AppConfig, fetcher: Arc<dyn Fetch>, probe: &dyn ConnectivityProbe) -> Self {
        let online = probe.is_online();
        tracing::info!("Session starting {}", if online { "online" } else { "offline" });

        let gateway = GiosClient::new(fetcher.clone(), config.api.base_url.clone())
            .with_error_log(ErrorLog::new(config.storage.error_log.clone()));
        let geocoder = Geocoder::new(fetcher, config.api.geocode_url.clone());
        let worker = StationFetchWorker::new();

        Self {
            config,
            gateway,
            geocoder,
            stations: StationCollection::new(),
            online: AtomicBool::new(online),
            dates: Mutex::new(Vec::new()),
            worker,
        }
    }

    /// Production wiring: reqwest transport and a TCP probe.
    pub fn from_config(config: AppConfig) -> Result<Self, AqError> {
        let fetcher = Arc::new(HttpFetcher::new(&config.api)?);
        let probe = TcpProbe::new(&config.connectivity);
        Ok(Self::new(config, fetcher, &probe))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn stations(&self) -> &StationCollection {
        &self.stations
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Forces the mode, e.g. from a user command.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::AcqRel);
        if was != online {
            tracing::info!("Switched to {} mode", if online { "online" } else { "offline" });
        }
    }

    /// Copy of the dates log.
    pub fn dates(&self) -> Vec<String> {
        self.lock_dates().clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.worker.is_busy()
    }

    fn lock_dates(&self) -> MutexGuard<'_, Vec<String>> {
        self.dates.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Updates the mode after a remote call and logs failures.
    fn observe<T>(&self, source: DataSource, subject: Option<&str>, operation: &str, result: &Result<T, AqError>) {
        match result {
            Ok(_) => self.set_online(true),
            Err(e) => {
                logging::log_failure(source, subject, operation, e);
                if e.is_network_origin() {
                    self.set_online(false);
                }
            }
        }
    }

    fn require_station(&self, station_id: i64) -> Result<Station, AqError> {
        self.stations
            .get(station_id)
            .ok_or(AqError::UnknownStation(station_id))
    }

    // -----------------------------------------------------------------------
    // Station list
    // -----------------------------------------------------------------------

    /// Starts a background station fetch. Returns `false` when one is
    /// already running; the request is then dropped.
    pub fn request_station_fetch(&self, query: StationQuery) -> bool {
        let gateway = self.gateway.clone();
        let geocoder = self.geocoder.clone();

        let accepted = self.worker.request(move || match query {
            StationQuery::All => gateway.fetch_all_stations(),
            StationQuery::City(city) => gateway.fetch_by_city(&city),
            StationQuery::Radius { address, radius_km } => {
                gateway.fetch_by_radius(&geocoder, &address, radius_km)
            }
        });

        if accepted {
            tracing::debug!("Station fetch dispatched");
        }
        accepted
    }

    /// Applies a finished station fetch, if there is one. A successful
    /// result replaces the collection and clears the dates log.
    ///
    /// Returns the number of stations now in the collection.
    pub fn poll_station_fetch(&self) -> Option<Result<usize, AqError>> {
        let result = self.worker.poll()?;
        self.observe(DataSource::Gios, None, "Fetch stations", &result);

        Some(result.map(|stations| {
            let count = stations.len();
            self.stations.replace_all(stations);
            self.lock_dates().clear();
            count
        }))
    }

    /// Blocks until the background fetch, if any, has finished, then applies
    /// it. Intended for non-interactive callers.
    pub fn wait_station_fetch(&self) -> Option<Result<usize, AqError>> {
        self.worker.wait_idle();
        self.poll_station_fetch()
    }

    // -----------------------------------------------------------------------
    // Sensors
    // -----------------------------------------------------------------------

    /// Sensors of `station_id`.
    ///
    /// Online, the remote list is returned and mirrored into the station's
    /// `sensor_names`, with an empty `sensor_history` entry created for new
    /// sensors. Offline, the list is derived from stored history only.
    pub fn fetch_sensors(&self, station_id: i64) -> Result<Vec<Sensor>, AqError> {
        let station = self.require_station(station_id)?;

        if !self.is_online() {
            let sensors = cached_sensors(&station);
            tracing::debug!("Offline: {} cached sensors for station {}", sensors.len(), station_id);
            if sensors.is_empty() {
                return Err(AqError::NoDataFound(NoDataKind::Sensors));
            }
            return Ok(sensors);
        }

        let result = self.gateway.fetch_sensors(station_id);
        self.observe(DataSource::Gios, Some(&station_id.to_string()), "Fetch sensors", &result);
        let sensors = result?;

        self.stations.with_stations_mut(|stations| {
            if let Some(station) = stations.iter_mut().find(|s| s.id == station_id) {
                for sensor in &sensors {
                    station.sensor_names.insert(sensor.id, sensor.name.clone());
                    station.sensor_history.entry(sensor.id).or_default();
                }
            }
        });
        Ok(sensors)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Checks that `sensor_id` is on the station's sensor list, fetching the
    /// list first if the station has none yet.
    fn require_sensor(&self, station_id: i64, sensor_id: i64) -> Result<(), AqError> {
        let mut station = self.require_station(station_id)?;
        if station.sensor_names.is_empty() {
            self.fetch_sensors(station_id)?;
            station = self.require_station(station_id)?;
        }

        if station.sensor_names.contains_key(&sensor_id) {
            Ok(())
        } else {
            Err(AqError::UnknownSensor { station_id, sensor_id })
        }
    }

    /// Measurement series of one sensor with its analysis.
    ///
    /// Online, the sensor must be on the station's sensor list; the series
    /// is fetched and reconciled into the station, which appends one
    /// aggregate point and one dates-log entry. Offline, the stored values
    /// are replayed with synthetic daily timestamps.
    pub fn fetch_history(&self, station_id: i64, sensor_id: i64) -> Result<SeriesView, AqError> {
        let window = self.config.history.retention_window;

        if !self.is_online() {
            let station = self.require_station(station_id)?;
            let values = station
                .sensor_history
                .get(&sensor_id)
                .filter(|values| !values.is_empty())
                .ok_or(AqError::NoDataFound(NoDataKind::Measurements))?;

            let points = reconcile::replay_history(values, Utc::now());
            let analysis = stats::analyze_recent(&points, window);
            return Ok(SeriesView {
                origin: SeriesOrigin::Cached,
                points,
                analysis,
            });
        }

        self.require_sensor(station_id, sensor_id)?;

        let result = self.gateway.fetch_measurements(sensor_id);
        self.observe(DataSource::Gios, Some(&sensor_id.to_string()), "Fetch measurements", &result);
        let series = result?;

        let reconciled = self.stations.with_stations_mut(|stations| -> Result<reconcile::Reconciliation, AqError> {
            let station = stations
                .iter_mut()
                .find(|s| s.id == station_id)
                .ok_or(AqError::UnknownStation(station_id))?;
            let mut dates = self.lock_dates();
            reconcile::reconcile(station, &mut dates, sensor_id, &series.values, window)
        });

        let reconciled = match reconciled {
            Ok(r) => r,
            Err(e) => {
                logging::log_failure(DataSource::Session, Some(&sensor_id.to_string()), "Reconcile", &e);
                return Err(e);
            }
        };

        let analysis = stats::analyze_recent(&reconciled.series, window);
        Ok(SeriesView {
            origin: SeriesOrigin::Remote,
            points: reconciled.series,
            analysis,
        })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Saves one station with the current dates log. Without `filename` a
    /// timestamped default name is used. Empty sensor histories are filled
    /// from the network only while online.
    pub fn save_snapshot(&self, station_id: i64, filename: Option<&str>) -> Result<PathBuf, AqError> {
        let station = self.require_station(station_id)?;
        let dates = self.dates();
        let filename = match filename {
            Some(name) => name.to_string(),
            None => cache::default_snapshot_name(station_id, Local::now().naive_local()),
        };

        let gateway = self.is_online().then_some(&self.gateway);
        let result = cache::save(
            &self.config.storage.save_dir,
            &filename,
            &dates,
            &station,
            gateway,
            self.config.history.retention_window,
        );

        if let Err(e) = &result {
            logging::log_failure(DataSource::Cache, Some(&filename), "Save snapshot", e);
        }
        result
    }

    /// Loads a snapshot, replacing the station with the same id (or adding
    /// it) and the dates log. Returns the station id, or `None` when the
    /// file is missing or unreadable.
    pub fn load_snapshot(&self, filename: &str) -> Option<i64> {
        let snapshot = cache::load(&self.config.storage.save_dir, filename)?;
        let station_id = snapshot.station.id;

        self.stations.upsert(snapshot.station);
        *self.lock_dates() = snapshot.dates;
        Some(station_id)
    }

    pub fn list_snapshots(&self) -> Result<Vec<String>, AqError> {
        cache::list_snapshots(&self.config.storage.save_dir)
    }
}
