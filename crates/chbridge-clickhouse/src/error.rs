//! Errors raised while establishing a client.

use chbridge_pipeline::ConnectionError;
use thiserror::Error;

/// Errors that prevent a [`ClickHouseClient`](crate::ClickHouseClient) from
/// being built or connected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Host/port do not form a valid URL.
    #[error("invalid server address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// The server did not answer the health check.
    #[error("cannot reach ClickHouse at {address}: {source}")]
    Unreachable {
        address: String,
        source: ConnectionError,
    },
}

/// Result type alias for client construction.
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Build(err.to_string())
    }
}

/// Map a transport failure into the pipeline's connection error.
pub(crate) fn transport(err: &reqwest::Error) -> ConnectionError {
    if err.is_timeout() {
        ConnectionError::Transport(format!("statement timed out: {err}"))
    } else {
        ConnectionError::Transport(err.to_string())
    }
}
