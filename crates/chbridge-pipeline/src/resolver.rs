//! Catalog type resolution.
//!
//! Every caller (export, preview, ingest target) classifies catalog types
//! through [`classify`], so a column is always transferred the same way.

use std::collections::BTreeMap;

use chbridge_model::{CatalogColumn, ColumnSpec, RawValue, TransferType};
use tracing::debug;

use crate::connection::{Connection, QueryContext};
use crate::error::{BridgeError, ConnectionError, Result};
use crate::mapper::map_columns;
use crate::sql::describe_statement;

/// Leading-token prefixes, checked in order. `Enum8(...)`/`Enum16(...)` are
/// carried as text.
const TYPE_PREFIXES: [(&str, TransferType); 6] = [
    ("UInt32", TransferType::UInt32),
    ("UInt16", TransferType::UInt16),
    ("UInt8", TransferType::UInt8),
    ("Float32", TransferType::Float32),
    ("DateTime", TransferType::DateTime),
    ("Enum", TransferType::String),
];

/// Classify a raw catalog type string.
///
/// Only the leading token is inspected, so parameterized types such as
/// `DateTime('UTC')` or `Enum8('a' = 1)` resolve by their base name.
/// Anything unrecognized is a string.
#[must_use]
pub fn classify(raw_type: &str) -> TransferType {
    let token = raw_type
        .trim_start()
        .split(|ch: char| ch == '(' || ch.is_whitespace())
        .next()
        .unwrap_or_default();
    TYPE_PREFIXES
        .iter()
        .find(|(prefix, _)| token.starts_with(prefix))
        .map_or(TransferType::String, |(_, ty)| *ty)
}

/// Columns of one table, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<CatalogColumn>,
}

impl TableSchema {
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Column name to transfer type. The first occurrence of a name wins.
    #[must_use]
    pub fn types(&self) -> BTreeMap<String, TransferType> {
        let mut types = BTreeMap::new();
        for column in &self.columns {
            types
                .entry(column.name.clone())
                .or_insert(column.transfer_type);
        }
        types
    }

    /// Build the transfer plan for `requested`, in request order.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<ColumnSpec>> {
        let origin = format!("table {}", self.table);
        let positions = map_columns(requested, &self.names(), &origin)?;
        Ok(positions
            .into_iter()
            .map(|idx| self.columns[idx].spec())
            .collect())
    }
}

/// Reads column types from the database catalog.
pub struct TypeResolver<'a> {
    connection: &'a dyn Connection,
    context: &'a QueryContext,
}

impl<'a> TypeResolver<'a> {
    pub fn new(connection: &'a dyn Connection, context: &'a QueryContext) -> Self {
        Self {
            connection,
            context,
        }
    }

    /// Describe `table`, keeping raw catalog types alongside their class.
    pub fn describe(&self, table: &str) -> Result<TableSchema> {
        let catalog_error = |source: ConnectionError| BridgeError::Catalog {
            table: table.to_string(),
            source,
        };
        let sql = describe_statement(table);
        let mut cursor = self
            .connection
            .query(self.context, &sql, &[])
            .map_err(catalog_error)?;

        let mut columns = Vec::new();
        while let Some(row) = cursor.next_row().map_err(catalog_error)? {
            let mut cells = row.into_iter();
            let (Some(name), Some(raw_type)) = (cells.next(), cells.next()) else {
                return Err(catalog_error(ConnectionError::Protocol(
                    "catalog row has fewer than two fields".to_string(),
                )));
            };
            let raw_type = raw_text(raw_type);
            columns.push(CatalogColumn {
                name: raw_text(name),
                transfer_type: classify(&raw_type),
                raw_type,
            });
        }
        debug!(table, column_count = columns.len(), "resolved catalog types");
        Ok(TableSchema {
            table: table.to_string(),
            columns,
        })
    }

    /// Column name to transfer type for `table`.
    pub fn resolve(&self, table: &str) -> Result<BTreeMap<String, TransferType>> {
        Ok(self.describe(table)?.types())
    }
}

fn raw_text(value: RawValue) -> String {
    match value {
        RawValue::Text(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;

    #[test]
    fn classifies_by_leading_token() {
        assert_eq!(classify("UInt32"), TransferType::UInt32);
        assert_eq!(classify("UInt16"), TransferType::UInt16);
        assert_eq!(classify("UInt8"), TransferType::UInt8);
        assert_eq!(classify("Float32"), TransferType::Float32);
        assert_eq!(classify("DateTime"), TransferType::DateTime);
        assert_eq!(classify("DateTime('Europe/London')"), TransferType::DateTime);
        assert_eq!(classify("DateTime64(3)"), TransferType::DateTime);
        assert_eq!(
            classify("Enum8('terraced' = 1, 'flat' = 2)"),
            TransferType::String
        );
    }

    #[test]
    fn unrecognized_types_are_strings() {
        for raw in ["String", "UInt64", "Float64", "Date", "Nullable(UInt8)", "LowCardinality(String)", ""] {
            assert_eq!(classify(raw), TransferType::String, "{raw}");
        }
    }

    #[test]
    fn plan_follows_request_order() {
        let schema = TableSchema {
            table: "trips".to_string(),
            columns: vec![
                CatalogColumn {
                    name: "id".to_string(),
                    raw_type: "UInt32".to_string(),
                    transfer_type: TransferType::UInt32,
                },
                CatalogColumn {
                    name: "fare".to_string(),
                    raw_type: "Float32".to_string(),
                    transfer_type: TransferType::Float32,
                },
            ],
        };
        let plan = schema.plan(&["fare", "id"]).expect("plan");
        assert_eq!(
            plan,
            vec![
                ColumnSpec::new("fare", TransferType::Float32),
                ColumnSpec::new("id", TransferType::UInt32),
            ]
        );
        let err = schema.plan(&["tip"]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"column tip not found in table trips (available: id, fare)");
    }

    #[test]
    fn resolve_maps_names_to_types_first_occurrence_wins() {
        let connection = MemoryConnection::new().with_table(
            "trips",
            &[
                ("id", "UInt32"),
                ("fare", "Float32"),
                ("id", "String"),
                ("pickup", "DateTime('UTC')"),
            ],
        );
        let context = QueryContext::default();

        let types = TypeResolver::new(&connection, &context)
            .resolve("trips")
            .expect("resolve");

        assert_eq!(
            types.into_iter().collect::<Vec<_>>(),
            vec![
                ("fare".to_string(), TransferType::Float32),
                ("id".to_string(), TransferType::UInt32),
                ("pickup".to_string(), TransferType::DateTime),
            ]
        );
        assert_eq!(connection.queried(), vec![describe_statement("trips")]);
    }

    #[test]
    fn resolve_reports_catalog_failures() {
        let connection = MemoryConnection::new()
            .with_failing_query(describe_statement("trips"), "Code: 497. DB::Exception: not enough privileges");
        let context = QueryContext::default();

        let err = TypeResolver::new(&connection, &context)
            .resolve("trips")
            .unwrap_err();

        match err {
            BridgeError::Catalog { table, source } => {
                assert_eq!(table, "trips");
                assert!(source.to_string().contains("not enough privileges"), "{source}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_rejects_short_catalog_rows() {
        let connection = MemoryConnection::new()
            .with_query(describe_statement("trips"), vec![vec![RawValue::from("id")]]);
        let context = QueryContext::default();

        let err = TypeResolver::new(&connection, &context)
            .resolve("trips")
            .unwrap_err();

        assert!(
            matches!(err, BridgeError::Catalog { source: ConnectionError::Protocol(_), .. }),
            "{err}"
        );
    }
}
