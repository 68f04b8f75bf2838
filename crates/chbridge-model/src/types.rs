//! Transfer types and the values that flow through a transfer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Closed set of scalar types the transfer pipeline understands.
///
/// Source-native types outside this set are carried as [`TransferType::String`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransferType {
    UInt8,
    UInt16,
    UInt32,
    Float32,
    /// Timestamp, carried as `YYYY-MM-DD HH:MM:SS` text.
    DateTime,
    #[default]
    String,
}

impl TransferType {
    /// All transfer types, in classification priority order.
    pub const ALL: [TransferType; 6] = [
        TransferType::UInt32,
        TransferType::UInt16,
        TransferType::UInt8,
        TransferType::Float32,
        TransferType::DateTime,
        TransferType::String,
    ];

    /// Catalog spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::Float32 => "Float32",
            Self::DateTime => "DateTime",
            Self::String => "String",
        }
    }

    /// Whether values of this type are unsigned integers.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32)
    }

    /// Largest value representable by an unsigned transfer type.
    #[must_use]
    pub const fn unsigned_max(self) -> Option<u64> {
        match self {
            Self::UInt8 => Some(u8::MAX as u64),
            Self::UInt16 => Some(u16::MAX as u64),
            Self::UInt32 => Some(u32::MAX as u64),
            Self::Float32 | Self::DateTime | Self::String => None,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ModelError::UnknownTransferType(s.to_string()))
    }
}

/// A single typed cell.
///
/// `DateTime` and `String` columns both carry [`TransferValue::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransferValue {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    Float32(f32),
    Text(String),
}

impl From<&str> for TransferValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TransferValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Untyped value as reported by a source cursor, before it is scanned into a
/// [`TransferValue`] for a known column type.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}
