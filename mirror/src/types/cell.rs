use std::fmt::Write;

use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{ErrorKind, MirrorError, MirrorResult};
use crate::mirror_error;

/// A single column value of a row.
///
/// The variants cover what the supported dialects can hand back for a cell.
/// Textual data decoded from the wire lands in [`Cell::String`] when it is
/// valid UTF-8 and [`Cell::Bytes`] otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the cell as text, the way conditional rules observe values.
    ///
    /// Bytes are decoded lossily, `NULL` becomes the empty string and every
    /// other variant uses its natural textual form.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::U64(value) => value.to_string(),
            Cell::F32(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::String(value) => value.clone(),
            Cell::Bytes(value) => String::from_utf8_lossy(value).into_owned(),
            Cell::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Cell::Json(value) => value.to_string(),
        }
    }

    /// Renders the cell as a SQL literal.
    ///
    /// Fails with [`ErrorKind::InvalidCellValue`] for values that have no SQL
    /// representation, such as non-finite floats.
    pub fn to_sql_literal(&self) -> MirrorResult<String> {
        match self {
            Cell::Null => Ok("NULL".to_owned()),
            Cell::Bool(value) => Ok(if *value { "TRUE" } else { "FALSE" }.to_owned()),
            Cell::I64(value) => Ok(value.to_string()),
            Cell::U64(value) => Ok(value.to_string()),
            Cell::F32(value) => {
                if !value.is_finite() {
                    return Err(non_finite_error(*value as f64));
                }
                Ok(value.to_string())
            }
            Cell::F64(value) => {
                if !value.is_finite() {
                    return Err(non_finite_error(*value));
                }
                Ok(value.to_string())
            }
            Cell::String(value) => Ok(quote_string(value)),
            Cell::Bytes(value) => match std::str::from_utf8(value) {
                Ok(text) => Ok(quote_string(text)),
                Err(_) => Ok(hex_literal(value)),
            },
            Cell::DateTime(value) => {
                Ok(format!("'{}'", value.format("%Y-%m-%d %H:%M:%S%.f")))
            }
            Cell::Time(value) => Ok(format!("'{}'", value.format("%H:%M:%S%.f"))),
            Cell::Json(value) => Ok(quote_string(&value.to_string())),
        }
    }
}

fn non_finite_error(value: f64) -> MirrorError {
    mirror_error!(
        ErrorKind::InvalidCellValue,
        "float value has no SQL representation",
        value
    )
}

/// Quotes a string literal, escaping backslashes, quotes and NUL bytes.
fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_null_literal() {
        assert_eq!(Cell::Null.to_sql_literal().unwrap(), "NULL");
        assert!(Cell::Null.is_null());
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(Cell::I64(-7).to_sql_literal().unwrap(), "-7");
        assert_eq!(Cell::U64(42).to_sql_literal().unwrap(), "42");
        assert_eq!(Cell::F64(1.5).to_sql_literal().unwrap(), "1.5");
        assert_eq!(Cell::Bool(true).to_sql_literal().unwrap(), "TRUE");
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let err = Cell::F64(f64::NAN).to_sql_literal().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCellValue);

        let err = Cell::F32(f32::INFINITY).to_sql_literal().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCellValue);
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(
            Cell::String("it's".to_owned()).to_sql_literal().unwrap(),
            r"'it\'s'"
        );
        assert_eq!(
            Cell::String(r"back\slash".to_owned())
                .to_sql_literal()
                .unwrap(),
            r"'back\\slash'"
        );
    }

    #[test]
    fn test_bytes_literal() {
        assert_eq!(
            Cell::Bytes(b"plain".to_vec()).to_sql_literal().unwrap(),
            "'plain'"
        );
        assert_eq!(
            Cell::Bytes(vec![0xde, 0xad]).to_sql_literal().unwrap(),
            "X'DEAD'"
        );
    }

    #[test]
    fn test_datetime_literal() {
        let value = NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        assert_eq!(
            Cell::DateTime(value).to_sql_literal().unwrap(),
            "'2021-03-04 05:06:07'"
        );
    }

    #[test]
    fn test_as_text() {
        assert_eq!(Cell::Null.as_text(), "");
        assert_eq!(Cell::String("a@b".to_owned()).as_text(), "a@b");
        assert_eq!(Cell::Bytes(b"a@b".to_vec()).as_text(), "a@b");
        assert_eq!(Cell::I64(3).as_text(), "3");
    }
}
