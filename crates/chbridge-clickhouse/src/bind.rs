//! Client-side binding of positional `?` parameters.
//!
//! The HTTP interface receives plain SQL, so parameters are rendered as
//! literals. Placeholders inside quoted strings or identifiers are left alone.

use chbridge_model::TransferValue;
use chbridge_pipeline::ConnectionError;

/// Replace each `?` outside quotes with the next parameter's literal.
pub fn bind(sql: &str, params: &[TransferValue]) -> Result<String, ConnectionError> {
    let mut bound = String::with_capacity(sql.len() + params.len() * 8);
    let mut remaining = params.iter();
    let mut placeholders = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            bound.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    bound.push(escaped);
                }
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                bound.push(ch);
            }
            '?' => {
                placeholders += 1;
                let value = remaining.next().ok_or_else(|| {
                    ConnectionError::Binding(format!(
                        "placeholder {placeholders} has no parameter ({} supplied)",
                        params.len()
                    ))
                })?;
                push_literal(&mut bound, value);
            }
            _ => bound.push(ch),
        }
    }

    if remaining.next().is_some() {
        return Err(ConnectionError::Binding(format!(
            "{} parameters supplied for {placeholders} placeholders",
            params.len()
        )));
    }
    Ok(bound)
}

/// Render one value as a SQL literal.
pub fn push_literal(out: &mut String, value: &TransferValue) {
    match value {
        TransferValue::UInt8(v) => out.push_str(&v.to_string()),
        TransferValue::UInt16(v) => out.push_str(&v.to_string()),
        TransferValue::UInt32(v) => out.push_str(&v.to_string()),
        TransferValue::Float32(v) if v.is_nan() => out.push_str("nan"),
        TransferValue::Float32(v) if v.is_infinite() => {
            out.push_str(if v.is_sign_negative() { "-inf" } else { "inf" });
        }
        TransferValue::Float32(v) => out.push_str(&v.to_string()),
        TransferValue::Text(text) => {
            out.push('\'');
            for ch in text.chars() {
                if ch == '\'' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push('\'');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_in_order() {
        let sql = bind(
            "INSERT INTO `t` (`a`, `b`, `c`) VALUES (?, ?, ?)",
            &[
                TransferValue::UInt32(7),
                TransferValue::Float32(1.5),
                TransferValue::from("it's \\ here"),
            ],
        )
        .expect("bind");
        assert_eq!(
            sql,
            r"INSERT INTO `t` (`a`, `b`, `c`) VALUES (7, 1.5, 'it\'s \\ here')"
        );
    }

    #[test]
    fn quoted_question_marks_are_not_placeholders() {
        let sql = bind("SELECT '?', `we?rd`, 'a\\'?' WHERE x = ?", &[TransferValue::UInt8(1)])
            .expect("bind");
        assert_eq!(sql, "SELECT '?', `we?rd`, 'a\\'?' WHERE x = 1");
    }

    #[test]
    fn special_floats() {
        let mut out = String::new();
        push_literal(&mut out, &TransferValue::Float32(f32::NAN));
        out.push(' ');
        push_literal(&mut out, &TransferValue::Float32(f32::NEG_INFINITY));
        assert_eq!(out, "nan -inf");
    }

    #[test]
    fn count_mismatch_is_a_binding_error() {
        let err = bind("VALUES (?, ?)", &[TransferValue::UInt8(1)]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"parameter binding error: placeholder 2 has no parameter (1 supplied)");

        let err = bind("VALUES (?)", &[TransferValue::UInt8(1), TransferValue::UInt8(2)]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"parameter binding error: 2 parameters supplied for 1 placeholders");
    }

    #[test]
    fn no_params_leaves_sql_untouched() {
        assert_eq!(bind("SHOW TABLES", &[]).expect("bind"), "SHOW TABLES");
    }
}
