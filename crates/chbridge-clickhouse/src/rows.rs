//! Decoding of `JSONCompactEachRow` result lines.

use chbridge_model::RawValue;
use chbridge_pipeline::ConnectionError;
use serde_json::Value;

/// Output format requested for every query.
pub const RESULT_FORMAT: &str = "JSONCompactEachRow";

/// Decode one result line (a JSON array) into raw cells.
///
/// An exception the server wrote into the stream after the headers were
/// sent is reported as a server error.
pub fn parse_row(line: &str) -> Result<Vec<RawValue>, ConnectionError> {
    if let Some(err) = server_exception(line) {
        return Err(err);
    }
    let cells: Vec<Value> = serde_json::from_str(line)
        .map_err(|err| ConnectionError::Protocol(format!("malformed result row: {err}")))?;
    Ok(cells.into_iter().map(raw_value).collect())
}

/// Recognize a `Code: N. DB::Exception: ...` message.
pub fn server_exception(text: &str) -> Option<ConnectionError> {
    let text = text.trim();
    let rest = text.strip_prefix("Code: ")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    Some(ConnectionError::Server {
        code: digits.parse().ok(),
        message: text.to_string(),
    })
}

fn raw_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(flag) => RawValue::Bool(flag),
        Value::Number(number) => {
            if let Some(v) = number.as_u64() {
                RawValue::UInt(v)
            } else if let Some(v) = number.as_i64() {
                RawValue::Int(v)
            } else {
                number.as_f64().map_or(RawValue::Null, RawValue::Float)
            }
        }
        Value::String(text) => RawValue::Text(text),
        other @ (Value::Array(_) | Value::Object(_)) => RawValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalar_cells() {
        let row = parse_row(r#"[1, -2, 2.5, "2024-01-01 00:00:00", null, true]"#).expect("row");
        assert_eq!(
            row,
            vec![
                RawValue::UInt(1),
                RawValue::Int(-2),
                RawValue::Float(2.5),
                RawValue::from("2024-01-01 00:00:00"),
                RawValue::Null,
                RawValue::Bool(true),
            ]
        );
    }

    #[test]
    fn nested_values_become_text() {
        let row = parse_row(r#"[[1,2], {"a":1}]"#).expect("row");
        assert_eq!(row, vec![RawValue::from("[1,2]"), RawValue::from(r#"{"a":1}"#)]);
    }

    #[test]
    fn stream_exception_is_a_server_error() {
        let err = parse_row("Code: 241. DB::Exception: Memory limit exceeded. (MEMORY_LIMIT_EXCEEDED)")
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Server { code: Some(241), .. }), "{err}");
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = parse_row("not json").unwrap_err();
        assert!(matches!(err, ConnectionError::Protocol(_)), "{err}");
    }
}
