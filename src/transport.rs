//! HTTP access to the sensor board.
//!
//! Remote trouble never surfaces as an error here: a failed fetch is a
//! skipped cycle and a failed reset is `false`.

use log::{debug, info, warn};
use std::fmt;

pub const DATA_PATH: &str = "/data";
pub const RESET_PATH: &str = "/delete_log";

/// Substring the reset endpoint returns once the remote log is cleared
pub const ACK_TOKEN: &str = "LOG_DELETED";

/// Why a poll produced nothing to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The sensor answered with a status other than 200
    Status(u16),
    /// 200 with nothing but whitespace in the body
    EmptyBody,
    /// Connection, DNS, timeout or body read failure
    Network(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Status(code) => write!(f, "HTTP status {code}"),
            SkipReason::EmptyBody => write!(f, "empty response body"),
            SkipReason::Network(msg) => write!(f, "network error: {msg}"),
        }
    }
}

/// Result of a single poll of the data endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Reading(String),
    Skipped(SkipReason),
}

impl Fetch {
    pub fn into_reading(self) -> Option<String> {
        match self {
            Fetch::Reading(reading) => Some(reading),
            Fetch::Skipped(_) => None,
        }
    }
}

/// The two remote operations a session and the menu rely on
pub trait Transport {
    fn fetch_reading(&self) -> Fetch;

    /// True only when the board answered 200 and acknowledged with [`ACK_TOKEN`].
    fn reset_remote(&self) -> bool;
}

/// Network location of the sensor board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// [`Transport`] over plain HTTP using the library's default timeouts
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: Endpoint,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            agent: ureq::Agent::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Status and body of a GET; `Err` only for transport-level failures.
    fn get(&self, path: &str) -> Result<(u16, String), String> {
        let url = self.endpoint.url(path);
        match self.agent.get(&url).call() {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|e| e.to_string())?;
                Ok((status, body))
            }
            Err(ureq::Error::Status(status, response)) => {
                Ok((status, response.into_string().unwrap_or_default()))
            }
            Err(ureq::Error::Transport(transport)) => Err(transport.to_string()),
        }
    }
}

impl Transport for HttpTransport {
    fn fetch_reading(&self) -> Fetch {
        match self.get(DATA_PATH) {
            Ok((200, body)) => {
                let reading = body.trim();
                if reading.is_empty() {
                    Fetch::Skipped(SkipReason::EmptyBody)
                } else {
                    Fetch::Reading(reading.to_string())
                }
            }
            Ok((status, _)) => Fetch::Skipped(SkipReason::Status(status)),
            Err(e) => {
                warn!("error fetching data from {}: {}", self.endpoint, e);
                Fetch::Skipped(SkipReason::Network(e))
            }
        }
    }

    fn reset_remote(&self) -> bool {
        match self.get(RESET_PATH) {
            Ok((200, body)) if body.contains(ACK_TOKEN) => {
                info!("logs deleted on {} and counter reset", self.endpoint);
                true
            }
            Ok((status, body)) => {
                warn!(
                    "reset on {} not acknowledged (status {})",
                    self.endpoint, status
                );
                debug!("reset response body: {:?}", body);
                false
            }
            Err(e) => {
                warn!("error deleting logs on {}: {}", self.endpoint, e);
                false
            }
        }
    }
}
