/// Service configuration loader - parses aqmon.toml
///
/// Separates endpoints, storage locations and the history retention window
/// from code. Every field has a default, so the file is optional; a file that
/// exists but cannot be parsed is reported rather than silently ignored.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "aqmon.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "AQMON_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub connectivity: ConnectivityConfig,
}

/// Remote endpoints
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base of the station/sensor/data REST API (no trailing slash).
    pub base_url: String,
    /// Nominatim-compatible search endpoint.
    pub geocode_url: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gios.gov.pl/pjp-api/rest".to_string(),
            geocode_url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "AQIApp/1.0".to_string(),
        }
    }
}

/// Local files
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one snapshot file per saved station.
    pub save_dir: PathBuf,
    /// Append-only log of skipped records and failed station fetches.
    pub error_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("savefiles"),
            error_log: PathBuf::from("error_log.txt"),
        }
    }
}

/// History retention
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Most recent points kept per sensor, and the analysis display window.
    pub retention_window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { retention_window: 50 }
    }
}

/// Connectivity probe
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// `host:port` the probe tries to open a TCP connection to.
    pub probe_address: String,
    pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_address: "api.gios.gov.pl:443".to_string(),
            probe_timeout_ms: 3000,
        }
    }
}

impl AppConfig {
    /// Rejects values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.retention_window == 0 {
            return Err(ConfigError::Invalid(
                "history.retention_window must be at least 1".to_string(),
            ));
        }
        if self.api.base_url.is_empty() {
            return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str, origin: &Path) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path`. A missing file yields the defaults.
pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

/// Loads configuration from `$AQMON_CONFIG` (after reading `.env`), falling
/// back to `aqmon.toml` in the working directory.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    dotenv::dotenv().ok();

    let path = env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_config_from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_service_endpoints() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "https://api.gios.gov.pl/pjp-api/rest");
        assert_eq!(config.history.retention_window, 50);
        assert_eq!(config.storage.save_dir, PathBuf::from("savefiles"));
        assert_eq!(config.storage.error_log, PathBuf::from("error_log.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [history]
            retention_window = 24

            [storage]
            save_dir = "/tmp/aqmon"
            "#,
            Path::new("inline.toml"),
        )
        .expect("partial config should parse");

        assert_eq!(config.history.retention_window, 24);
        assert_eq!(config.storage.save_dir, PathBuf::from("/tmp/aqmon"));
        assert_eq!(config.storage.error_log, PathBuf::from("error_log.txt"));
        assert_eq!(config.api, ApiConfig::default());
    }

    #[test]
    fn test_zero_retention_window_is_rejected() {
        let result = parse_config("[history]\nretention_window = 0\n", Path::new("inline.toml"));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = parse_config("[history\nretention_window = ", Path::new("broken.toml"));
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, PathBuf::from("broken.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("aqmon.toml");
        let mut file = fs::File::create(&path).expect("create config");
        writeln!(file, "[connectivity]\nprobe_timeout_ms = 500").expect("write config");

        let config = load_config_from(&path).expect("config should load");
        assert_eq!(config.connectivity.probe_timeout_ms, 500);
        assert_eq!(config.connectivity.probe_address, "api.gios.gov.pl:443");
    }
}
