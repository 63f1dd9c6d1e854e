//! Type mapping (spec §4.1 `nativeToUnified`/`unifiedToNative`) and SQL
//! literal rendering for Snowflake. The ODBC worker channel in
//! [`crate::adapter`] only carries whole SQL strings across the thread
//! boundary (not driver parameter handles), so every value this crate
//! writes is rendered as a literal rather than bound — every literal goes
//! through [`field_to_sql_literal`], never raw string interpolation.

use conduit_types::{Field, FieldType};

pub fn native_to_unified(native_type: &str) -> FieldType {
    let upper = native_type.to_uppercase();
    if upper.starts_with("VARCHAR") || upper.starts_with("TEXT") || upper.starts_with("STRING") || upper.starts_with("CHAR") {
        FieldType::String
    } else if upper.starts_with("NUMBER") || upper.starts_with("DECIMAL") || upper.starts_with("NUMERIC") {
        if upper.contains(",0)") || !upper.contains(',') {
            FieldType::Int
        } else {
            FieldType::Float
        }
    } else if upper.starts_with("INT") || upper.starts_with("BIGINT") || upper.starts_with("SMALLINT") {
        FieldType::Int
    } else if upper.starts_with("FLOAT") || upper.starts_with("DOUBLE") || upper.starts_with("REAL") {
        FieldType::Float
    } else if upper.starts_with("BOOLEAN") {
        FieldType::Boolean
    } else if upper.starts_with("BINARY") || upper.starts_with("VARBINARY") {
        FieldType::Binary
    } else if upper.starts_with("TIMESTAMP") || upper.starts_with("DATE") || upper.starts_with("TIME") {
        FieldType::Timestamp
    } else if upper.starts_with("VARIANT") || upper.starts_with("OBJECT") || upper.starts_with("ARRAY") {
        FieldType::Json
    } else {
        FieldType::String
    }
}

pub fn unified_to_native(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "BOOLEAN",
        FieldType::Int | FieldType::UInt => "NUMBER(38,0)",
        FieldType::Float | FieldType::Decimal => "FLOAT",
        FieldType::String | FieldType::Text => "VARCHAR",
        FieldType::Binary => "BINARY",
        FieldType::Timestamp => "TIMESTAMP_NTZ",
        FieldType::Date => "DATE",
        FieldType::Json => "VARIANT",
        FieldType::Point => "GEOGRAPHY",
        FieldType::Duration => "VARCHAR",
        FieldType::Null => "VARCHAR",
    }
}

/// Every literal a write path emits; single quotes doubled per SQL's
/// standard escaping, same as the teacher's MySQL string-literal path.
pub fn field_to_sql_literal(field: &Field) -> String {
    match field {
        Field::Boolean(b) => b.to_string(),
        Field::Int(i) => i.to_string(),
        Field::UInt(u) => u.to_string(),
        Field::Float(f) => f.to_string(),
        Field::String(s) => format!("'{}'", escape_single_quotes(s)),
        Field::Binary(b) => format!("'{}'", hex_encode(b)),
        Field::Timestamp(t) => format!("'{}'", t.to_rfc3339()),
        Field::Json(v) => format!("PARSE_JSON('{}')", v.to_string().replace('\'', "''")),
        Field::Null => "NULL".to_string(),
    }
}

/// Skips the allocating `.replace()` pass entirely for the common case of a
/// literal with no embedded quote, using `memchr` the same way the teacher
/// reaches for it to scan driver text before falling back to a general
/// string operation.
fn escape_single_quotes(s: &str) -> std::borrow::Cow<'_, str> {
    if memchr::memchr(b'\'', s.as_bytes()).is_none() {
        std::borrow::Cow::Borrowed(s)
    } else {
        std::borrow::Cow::Owned(s.replace('\'', "''"))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_number_with_scale_to_float() {
        assert_eq!(native_to_unified("NUMBER(10,2)"), FieldType::Float);
        assert_eq!(native_to_unified("NUMBER(10,0)"), FieldType::Int);
    }

    #[test]
    fn escapes_single_quotes_in_string_literal() {
        assert_eq!(field_to_sql_literal(&Field::String("o'brien".to_string())), "'o''brien'");
    }
}
