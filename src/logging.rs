/// Structured logging for the air quality monitoring service
///
/// Console output goes through `tracing`; records that the gateway skips
/// while parsing bulk payloads are additionally appended to a plain-text
/// error log so they can be audited after the session.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::model::AqError;

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aqmon_service={}", level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Gios,
    Geocoder,
    Cache,
    Session,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Gios => write!(f, "GIOS"),
            DataSource::Geocoder => write!(f, "GEO"),
            DataSource::Cache => write!(f, "CACHE"),
            DataSource::Session => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the source simply has nothing for this request
    Expected,
    /// Unexpected failure - service degradation, API change or local I/O trouble
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classifies a failure by its kind.
pub fn classify_failure(err: &AqError) -> FailureType {
    match err {
        AqError::NoDataFound(_) => FailureType::Expected,
        AqError::HttpStatus(_) | AqError::MalformedResponse(_) | AqError::Persistence(_) => {
            FailureType::Unexpected
        }
        AqError::Transport(_)
        | AqError::GeocodeFailed(_)
        | AqError::UnknownStation(_)
        | AqError::UnknownSensor { .. } => FailureType::Unknown,
    }
}

/// Logs a failed operation at a level matching its classification.
pub fn log_failure(source: DataSource, subject: Option<&str>, operation: &str, err: &AqError) {
    let failure_type = classify_failure(err);
    let subject = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

    match failure_type {
        FailureType::Expected => {
            tracing::debug!("{}{}: {} failed [{}]: {}", source, subject, operation, failure_type, err)
        }
        FailureType::Unexpected => {
            tracing::error!("{}{}: {} failed [{}]: {}", source, subject, operation, failure_type, err)
        }
        FailureType::Unknown => {
            tracing::warn!("{}{}: {} failed [{}]: {}", source, subject, operation, failure_type, err)
        }
    }
}

// ---------------------------------------------------------------------------
// Error log file
// ---------------------------------------------------------------------------

/// Append-only audit log of records skipped during lenient parsing.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one timestamped line. Failures to write are only reported.
    pub fn record(&self, source: DataSource, message: &str) {
        let entry = format!(
            "{} {} {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            source,
            message
        );
        if let Err(e) = Self::append_to_file(&self.path, &entry) {
            tracing::warn!("Failed to write to error log {}: {}", self.path.display(), e);
        }
    }

    fn append_to_file(path: &Path, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}
