//! Driver-native row <-> [`Field`] conversion, applied only at the adapter
//! boundary (spec §9 "Dynamic maps as event payloads").

use conduit_types::{Field, FieldMap, FieldType};
use mysql_async::{Row, Value};

/// Converts one result row into a [`FieldMap`] by column name, matching on
/// the driver's untyped [`Value`] wire representation rather than the
/// column's declared type — `mysql_async` already decodes into one of these
/// five shapes regardless of the underlying MySQL column type, so this
/// total match never needs a string-cast fallback the way the Postgres
/// `Type`-keyed conversion does.
pub fn row_to_field_map(row: &Row) -> FieldMap {
    let mut map = FieldMap::new();
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let name = column.name_str().into_owned();
        let value = row.as_ref(idx).cloned().unwrap_or(Value::NULL);
        map.insert(name, value_to_field(value));
    }
    map
}

fn value_to_field(value: Value) -> Field {
    match value {
        Value::NULL => Field::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => Field::String(s),
            Err(e) => Field::Binary(e.into_bytes()),
        },
        Value::Int(i) => Field::Int(i),
        Value::UInt(u) => Field::UInt(u),
        Value::Float(f) => Field::Float(f as f64),
        Value::Double(d) => Field::Float(d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let naive = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .and_then(|d| d.and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros))
                .unwrap_or_default();
            Field::Timestamp(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            Field::String(format!(
                "{sign}{}:{hours:02}:{minutes:02}:{seconds:02}.{micros:06}",
                days as i64 * 24
            ))
        }
    }
}

/// `nativeToUnified` (spec §4.1): total, falls back to `"string"`.
pub fn native_to_unified(native_type: &str) -> FieldType {
    let lowered = native_type.to_ascii_lowercase();
    match lowered.split('(').next().unwrap_or(&lowered) {
        "tinyint" | "smallint" | "mediumint" | "int" | "bigint" | "year" => FieldType::Int,
        "decimal" | "numeric" | "float" | "double" => FieldType::Float,
        "char" | "varchar" => FieldType::String,
        "text" | "tinytext" | "mediumtext" | "longtext" => FieldType::Text,
        "json" => FieldType::Json,
        "datetime" | "timestamp" => FieldType::Timestamp,
        "date" => FieldType::Date,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => FieldType::Binary,
        _ => FieldType::String,
    }
}

/// `unifiedToNative` (spec §4.1): total, falls back to `text`.
pub fn unified_to_native(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "tinyint(1)",
        FieldType::Int | FieldType::UInt => "bigint",
        FieldType::Float | FieldType::Decimal => "double",
        FieldType::String => "varchar(255)",
        FieldType::Text => "text",
        FieldType::Binary => "blob",
        FieldType::Json => "json",
        FieldType::Timestamp => "datetime",
        FieldType::Date => "date",
        FieldType::Point => "point",
        FieldType::Duration => "time",
        FieldType::Null => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_to_unified_strips_size_modifier() {
        assert_eq!(native_to_unified("varchar(255)"), FieldType::String);
        assert_eq!(native_to_unified("int(11)"), FieldType::Int);
    }

    #[test]
    fn unified_to_native_round_trips_common_kinds() {
        assert_eq!(unified_to_native(FieldType::Json), "json");
        assert_eq!(unified_to_native(FieldType::Timestamp), "datetime");
    }
}
