//! Database connection seam.
//!
//! The pipeline never opens connections itself. Callers connect through a
//! concrete client (for example the ClickHouse HTTP client) and hand the
//! pipeline a [`ConnectionHandle`], which is either unset or connected.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chbridge_model::{RawValue, TransferValue};

use crate::error::{BridgeError, ConnectionError, Result};

/// Per-statement execution context.
///
/// `timeout` is a deadline for `exec`. A `query` cursor is never cut off by
/// it once rows are streaming. `query_id` is forwarded when the server
/// supports one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub timeout: Option<Duration>,
    pub query_id: Option<String>,
}

impl QueryContext {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

/// Forward-only cursor over query results.
///
/// Dropping the cursor releases the underlying stream.
pub trait RowCursor {
    /// Fetch the next row, or `None` once the result is exhausted.
    fn next_row(&mut self) -> std::result::Result<Option<Vec<RawValue>>, ConnectionError>;
}

/// A database connection able to run queries and statements.
///
/// `?` placeholders in `sql` are bound positionally from `params`.
pub trait Connection: Send + Sync {
    fn query(
        &self,
        context: &QueryContext,
        sql: &str,
        params: &[TransferValue],
    ) -> std::result::Result<Box<dyn RowCursor + '_>, ConnectionError>;

    fn exec(
        &self,
        context: &QueryContext,
        sql: &str,
        params: &[TransferValue],
    ) -> std::result::Result<(), ConnectionError>;
}

/// Explicit, shareable reference to the active connection.
#[derive(Clone, Default)]
pub struct ConnectionHandle {
    connection: Option<Arc<dyn Connection>>,
}

impl ConnectionHandle {
    /// A handle with no connection; every database operation fails with
    /// [`BridgeError::NotInitialized`].
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn connected<C: Connection + 'static>(connection: C) -> Self {
        Self {
            connection: Some(Arc::new(connection)),
        }
    }

    #[must_use]
    pub fn from_shared(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Borrow the connection, failing if none was established.
    pub fn get(&self) -> Result<&dyn Connection> {
        self.connection.as_deref().ok_or(BridgeError::NotInitialized)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_connected() {
            "Connected"
        } else {
            "Unset"
        };
        f.debug_tuple("ConnectionHandle").field(&state).finish()
    }
}
