//! Per-type conversion between transfer values and CSV field text.

use chbridge_model::{ColumnSpec, RawValue, TransferType, TransferValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BridgeError, Result};

/// How numeric CSV fields are parsed on ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Scan the leading number and drop trailing characters (with a warning).
    /// A field without any leading digits is still an error.
    #[default]
    Lenient,
    /// The whole trimmed field must be a number.
    Strict,
}

/// Encodes and decodes single fields according to their transfer type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCodec {
    policy: ParsePolicy,
}

impl RowCodec {
    #[must_use]
    pub fn new(policy: ParsePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    /// Render a value as a CSV field.
    ///
    /// Integers are plain decimal, floats always carry two decimal places and
    /// text passes through unchanged.
    #[must_use]
    pub fn encode(&self, value: &TransferValue) -> String {
        match value {
            TransferValue::UInt8(v) => v.to_string(),
            TransferValue::UInt16(v) => v.to_string(),
            TransferValue::UInt32(v) => v.to_string(),
            TransferValue::Float32(v) => format!("{v:.2}"),
            TransferValue::Text(text) => text.clone(),
        }
    }

    /// Decode one CSV field for `column`. `row` is the 1-based data row.
    ///
    /// Timestamps and strings are trusted and passed through as text.
    pub fn decode_field(&self, text: &str, column: &ColumnSpec, row: u64) -> Result<TransferValue> {
        let fail = || BridgeError::parse(row, column.name.as_str(), text, column.transfer_type);
        match column.transfer_type {
            TransferType::UInt8 | TransferType::UInt16 | TransferType::UInt32 => {
                let value = match self.policy {
                    ParsePolicy::Strict => text.trim().parse::<u64>().ok(),
                    ParsePolicy::Lenient => {
                        let (digits, rest) = leading_unsigned(text);
                        let value = digits.parse::<u64>().ok();
                        if value.is_some() {
                            note_discarded(rest, column, row);
                        }
                        value
                    }
                };
                value
                    .and_then(|v| unsigned_value(v, column.transfer_type))
                    .ok_or_else(fail)
            }
            TransferType::Float32 => {
                let value = match self.policy {
                    ParsePolicy::Strict => text.trim().parse::<f32>().ok(),
                    ParsePolicy::Lenient => {
                        let (number, rest) = leading_float(text);
                        let value = number.parse::<f32>().ok();
                        if value.is_some() {
                            note_discarded(rest, column, row);
                        }
                        value
                    }
                };
                value
                    .filter(|v| v.is_finite())
                    .map(TransferValue::Float32)
                    .ok_or_else(fail)
            }
            TransferType::DateTime | TransferType::String => Ok(TransferValue::from(text)),
        }
    }

    /// Convert a value read from a source cursor into the column's type.
    pub fn scan(&self, raw: RawValue, column: &ColumnSpec, row: u64) -> Result<TransferValue> {
        let ty = column.transfer_type;
        match (ty, raw) {
            (TransferType::DateTime | TransferType::String, RawValue::Null) => {
                Ok(TransferValue::Text(String::new()))
            }
            (TransferType::DateTime | TransferType::String, RawValue::Text(text)) => {
                Ok(TransferValue::Text(text))
            }
            (TransferType::DateTime | TransferType::String, other) => {
                Ok(TransferValue::Text(other.to_string()))
            }
            (_, RawValue::Text(text)) => self.decode_field(&text, column, row),
            (TransferType::Float32, RawValue::UInt(v)) => Ok(TransferValue::Float32(v as f32)),
            (TransferType::Float32, RawValue::Int(v)) => Ok(TransferValue::Float32(v as f32)),
            (TransferType::Float32, RawValue::Float(v)) => Ok(TransferValue::Float32(v as f32)),
            (_, RawValue::UInt(v)) => {
                unsigned_value(v, ty).ok_or_else(|| raw_error(&RawValue::UInt(v), column, row))
            }
            (_, RawValue::Int(v)) => u64::try_from(v)
                .ok()
                .and_then(|v| unsigned_value(v, ty))
                .ok_or_else(|| raw_error(&RawValue::Int(v), column, row)),
            (_, RawValue::Float(v)) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => {
                unsigned_value(v as u64, ty).ok_or_else(|| raw_error(&RawValue::Float(v), column, row))
            }
            (_, other) => Err(raw_error(&other, column, row)),
        }
    }
}

fn raw_error(raw: &RawValue, column: &ColumnSpec, row: u64) -> BridgeError {
    let value = match raw {
        RawValue::Null => "NULL".to_string(),
        other => other.to_string(),
    };
    BridgeError::parse(row, column.name.as_str(), value, column.transfer_type)
}

fn unsigned_value(value: u64, ty: TransferType) -> Option<TransferValue> {
    match ty {
        TransferType::UInt8 => u8::try_from(value).ok().map(TransferValue::UInt8),
        TransferType::UInt16 => u16::try_from(value).ok().map(TransferValue::UInt16),
        TransferType::UInt32 => u32::try_from(value).ok().map(TransferValue::UInt32),
        TransferType::Float32 | TransferType::DateTime | TransferType::String => None,
    }
}

fn note_discarded(rest: &str, column: &ColumnSpec, row: u64) {
    let rest = rest.trim_end();
    if !rest.is_empty() {
        warn!(
            row,
            column = %column.name,
            discarded = rest,
            "dropped trailing characters from numeric field"
        );
    }
}

/// Split off the leading `[+]digits` run, after leading whitespace.
/// Returns the digits (possibly empty) and the unparsed remainder.
fn leading_unsigned(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let text = text.strip_prefix('+').unwrap_or(text);
    let end = text
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(text.len());
    text.split_at(end)
}

/// Split off the longest leading decimal float (`[+-]d*[.d*][e[+-]d+]`).
/// The number part is empty when no mantissa digit is present.
fn leading_float(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut idx: usize| {
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        idx
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return ("", text);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    text.split_at(end)
}
