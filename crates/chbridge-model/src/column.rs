use serde::{Deserialize, Serialize};

use crate::types::TransferType;

/// A column name paired with the type it is transferred as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, transfer_type: TransferType) -> Self {
        Self {
            name: name.into(),
            transfer_type,
        }
    }

    /// Flat-file columns carry no type metadata and are always text.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, TransferType::String)
    }
}

/// A column as described by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogColumn {
    pub name: String,
    /// Type string exactly as reported by the catalog, e.g. `Enum8('a' = 1)`.
    pub raw_type: String,
    pub transfer_type: TransferType,
}

impl CatalogColumn {
    #[must_use]
    pub fn spec(&self) -> ColumnSpec {
        ColumnSpec::new(self.name.clone(), self.transfer_type)
    }
}
