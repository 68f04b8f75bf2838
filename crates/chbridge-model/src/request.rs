use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// One side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// The columnar database.
    ClickHouse,
    /// A delimited flat file.
    FlatFile,
}

impl Endpoint {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClickHouse => "clickhouse",
            Self::FlatFile => "flatfile",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clickhouse" => Ok(Self::ClickHouse),
            "flatfile" => Ok(Self::FlatFile),
            _ => Err(ModelError::UnknownEndpoint(s.to_string())),
        }
    }
}

/// Direction of a validated transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Database table to flat file.
    Export,
    /// Flat file to database table.
    Ingest,
}

/// A bulk transfer request.
///
/// `table` names the source (a database table or a file path) and `output`
/// names the destination (a file path or a database table). The order of
/// `columns` defines the output column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub source: Endpoint,
    pub target: Endpoint,
    pub table: String,
    pub columns: Vec<String>,
    pub output: String,
}

impl IngestionRequest {
    /// Resolve the transfer direction, if the endpoint pair is valid.
    ///
    /// Exactly one side must be the database.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match (self.source, self.target) {
            (Endpoint::ClickHouse, Endpoint::FlatFile) => Some(Direction::Export),
            (Endpoint::FlatFile, Endpoint::ClickHouse) => Some(Direction::Ingest),
            _ => None,
        }
    }
}

/// A request for a handful of sample rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub source: Endpoint,
    pub table: String,
    pub columns: Vec<String>,
}
