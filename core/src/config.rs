//! Session configuration.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change. Durations are expressed in seconds as floats; zero disables the
//! corresponding limit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Standing options a `Session` reapplies to its handle before every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub connect_timeout: f64,
    /// Whole-transfer timeout; a request's own `Timeout` overrides it.
    pub transfer_timeout: f64,
    pub max_connections: u32,
    pub keep_alive: bool,
    pub compression: bool,
    /// Upper bound on redirect hops regardless of a request's `Redirects`.
    pub max_redirects: u32,
    /// Cap on an in-memory response body, in bytes.
    pub max_body_size: usize,
    pub verify_tls: bool,
    pub buffer_size: usize,
    pub dns_cache_timeout: f64,
    pub user_agent: Option<String>,
    pub cookie_jar: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 30.0,
            transfer_timeout: 0.0,
            max_connections: 10,
            keep_alive: true,
            compression: true,
            max_redirects: 30,
            max_body_size: 100 * 1024 * 1024,
            verify_tls: true,
            buffer_size: 16 * 1024,
            dns_cache_timeout: 300.0,
            user_agent: Some(concat!("curlx/", env!("CARGO_PKG_VERSION")).to_string()),
            cookie_jar: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.connect_timeout)
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.transfer_timeout)
    }

    pub fn dns_cache_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.dns_cache_timeout)
    }
}

/// `None` for zero, negative or non-finite values.
fn secs_to_duration(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
