/// HTTP transport and connectivity probing.
///
/// Every remote call in the crate goes through the `Fetch` trait, so the
/// gateway and geocoder can be exercised against canned payloads and the
/// session can be driven offline in tests.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{ApiConfig, ConnectivityConfig};
use crate::model::AqError;

/// "GET this URL and give me the body" capability.
pub trait Fetch: Send + Sync {
    /// Returns the raw response body, or a `Transport`/`HttpStatus` error.
    fn get(&self, url: &str) -> Result<Vec<u8>, AqError>;
}

/// Blocking reqwest client used in production.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(api: &ApiConfig) -> Result<Self, AqError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(api.user_agent.clone())
            .build()
            .map_err(|e| AqError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, AqError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| AqError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AqError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .map_err(|e| AqError::Transport(format!("failed to read body: {}", e)))?;
        Ok(body.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// "Is a network path currently available" check.
///
/// A positive answer does not guarantee that any particular endpoint will
/// answer a request.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Opens (and immediately drops) a TCP connection to a known host.
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self {
            address: config.probe_address.clone(),
            timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_online(&self) -> bool {
        let addrs = match self.address.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::debug!("Probe could not resolve {}: {}", self.address, e);
                return false;
            }
        };

        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return true;
            }
        }
        false
    }
}

/// Fixed answer, for tests and for forcing offline start-up.
pub struct StaticProbe(pub bool);

impl ConnectivityProbe for StaticProbe {
    fn is_online(&self) -> bool {
        self.0
    }
}
