//! Connection settings for a ClickHouse server.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default HTTP interface port.
pub const DEFAULT_PORT: u16 = 8123;

/// Default per-statement timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Where and how to reach the server's HTTP interface.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Use HTTPS.
    pub secure: bool,
    /// Bounds connecting and each read from the server. A result stream is
    /// not cut off while rows keep arriving.
    pub timeout_secs: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: "default".to_string(),
            user: "default".to_string(),
            password: String::new(),
            secure: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClickHouseConfig {
    /// Root URL of the HTTP interface, e.g. `http://localhost:8123/`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}/", self.host.trim(), self.port)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ClickHouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
