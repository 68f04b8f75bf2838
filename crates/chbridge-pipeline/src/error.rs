//! Error types for transfer operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chbridge_model::{Endpoint, ErrorPayload, TransferType};
use thiserror::Error;

/// Errors reported by a [`Connection`](crate::Connection) implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// The request never reached the server or the response was cut off.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the statement.
    #[error("server error: {message}")]
    Server {
        /// Server-side error code, when reported.
        code: Option<u32>,
        message: String,
    },

    /// The server answered with something that could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Statement parameters did not match the placeholders.
    #[error("parameter binding error: {0}")]
    Binding(String),
}

/// Errors that abort a transfer, preview or catalog lookup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// No database connection has been established.
    #[error("connection not initialized")]
    NotInitialized,

    /// The catalog query for a table failed.
    #[error("failed to read catalog for {table}: {source}")]
    Catalog {
        table: String,
        source: ConnectionError,
    },

    /// A requested column is absent from the source or destination schema.
    #[error("column {column} not found in {origin} (available: {})", .available.join(", "))]
    UnknownColumn {
        column: String,
        origin: String,
        available: Vec<String>,
    },

    /// A field could not be converted to its transfer type.
    #[error("row {row}, column {column}: cannot parse {value:?} as {expected}")]
    Parse {
        row: u64,
        column: String,
        value: String,
        expected: TransferType,
    },

    /// A file could not be opened, created, read or written.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// The CSV layer failed while reading or writing a record.
    #[error("CSV error at row {row}: {source}")]
    Csv { row: u64, source: csv::Error },

    /// The source query failed.
    #[error("source query failed: {0}")]
    Query(#[source] ConnectionError),

    /// A destination statement failed.
    #[error("insert into {table} failed at row {row}: {source}")]
    Exec {
        table: String,
        row: u64,
        source: ConnectionError,
    },

    /// Source and target are not one database and one flat file.
    #[error("invalid source/target combination: {from} -> {to}")]
    InvalidCombination { from: Endpoint, to: Endpoint },

    /// The request violates a domain constraint (e.g. no columns requested).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Stable, caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized,
    Catalog,
    UnknownColumn,
    Parse,
    Io,
    Query,
    Exec,
    InvalidCombination,
    InvalidRequest,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::Catalog => "catalog",
            Self::UnknownColumn => "unknown_column",
            Self::Parse => "parse",
            Self::Io => "io",
            Self::Query => "query",
            Self::Exec => "exec",
            Self::InvalidCombination => "invalid_combination",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BridgeError {
    /// Create an UnknownColumn error.
    pub fn unknown_column<S: AsRef<str>>(
        column: impl Into<String>,
        origin: impl Into<String>,
        available: &[S],
    ) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            origin: origin.into(),
            available: available.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Create a Parse error.
    pub fn parse(
        row: u64,
        column: impl Into<String>,
        value: impl Into<String>,
        expected: TransferType,
    ) -> Self {
        Self::Parse {
            row,
            column: column.into(),
            value: value.into(),
            expected,
        }
    }

    /// Create an Io error.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Catalog { .. } => ErrorKind::Catalog,
            Self::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io { .. } | Self::Csv { .. } => ErrorKind::Io,
            Self::Query(_) => ErrorKind::Query,
            Self::Exec { .. } => ErrorKind::Exec,
            Self::InvalidCombination { .. } => ErrorKind::InvalidCombination,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Row the error refers to, if any (1-based, header excluded).
    #[must_use]
    pub fn row(&self) -> Option<u64> {
        match self {
            Self::Parse { row, .. } | Self::Csv { row, .. } | Self::Exec { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// Column the error refers to, if any.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Parse { column, .. } | Self::UnknownColumn { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Structured form of this error for relaying to a caller.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().as_str().to_string(),
            message: self.to_string(),
            row: self.row(),
            column: self.column().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_lists_available_columns() {
        let err = BridgeError::unknown_column("agee", "data.csv", &["id", "age"]);
        insta::assert_snapshot!(err.to_string(), @"column agee not found in data.csv (available: id, age)");
        assert_eq!(err.kind(), ErrorKind::UnknownColumn);
        assert_eq!(err.column(), Some("agee"));
    }

    #[test]
    fn parse_error_payload_carries_location() {
        let err = BridgeError::parse(2, "age", "not-a-number", TransferType::UInt8);
        let payload = err.payload();
        assert_eq!(payload.kind, "parse");
        assert_eq!(payload.row, Some(2));
        assert_eq!(payload.column.as_deref(), Some("age"));
        insta::assert_snapshot!(payload.message, @r#"row 2, column age: cannot parse "not-a-number" as UInt8"#);
    }

    #[test]
    fn csv_errors_are_reported_as_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        let err = BridgeError::Csv {
            row: 7,
            source: csv::Error::from(io_err),
        };
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.row(), Some(7));
    }

    #[test]
    fn invalid_combination_message() {
        let err = BridgeError::InvalidCombination {
            from: Endpoint::FlatFile,
            to: Endpoint::FlatFile,
        };
        assert_eq!(
            err.to_string(),
            "invalid source/target combination: flatfile -> flatfile"
        );
        assert_eq!(err.payload().kind, "invalid_combination");
    }
}
