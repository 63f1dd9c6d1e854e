//! Driver-native row <-> [`Field`] conversion, applied only at the adapter
//! boundary (spec §9 "Dynamic maps as event payloads": "round-trip-safe
//! conversion to driver-native column types performed at the adapter
//! boundary only").

use chrono::{DateTime, Utc};
use conduit_types::{Field, FieldMap, FieldType};
use tokio_postgres::types::Type;
use tokio_postgres::Row;

/// Converts one result row into a [`FieldMap`], matching on the column's
/// driver-reported `Type` to pick the right `FromSql` extraction. Falls
/// back to a text cast via `row.get::<_, String>` for any type not
/// explicitly handled, matching `nativeToUnified`'s contract of never
/// panicking on unknown input (spec §4.1).
pub fn row_to_field_map(row: &Row) -> FieldMap {
    let mut map = FieldMap::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = match *column.type_() {
            Type::BOOL => row.get::<_, Option<bool>>(idx).map(Field::Boolean),
            Type::INT2 => row.get::<_, Option<i16>>(idx).map(|v| Field::Int(v as i64)),
            Type::INT4 => row.get::<_, Option<i32>>(idx).map(|v| Field::Int(v as i64)),
            Type::INT8 => row.get::<_, Option<i64>>(idx).map(Field::Int),
            Type::FLOAT4 => row.get::<_, Option<f32>>(idx).map(|v| Field::Float(v as f64)),
            Type::FLOAT8 => row.get::<_, Option<f64>>(idx).map(Field::Float),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR => row.get::<_, Option<String>>(idx).map(Field::String),
            Type::JSON | Type::JSONB => row.get::<_, Option<serde_json::Value>>(idx).map(Field::Json),
            Type::TIMESTAMPTZ | Type::TIMESTAMP => {
                row.get::<_, Option<DateTime<Utc>>>(idx).map(Field::Timestamp)
            }
            Type::UUID => row.get::<_, Option<uuid::Uuid>>(idx).map(|v| Field::String(v.to_string())),
            Type::BYTEA => row.get::<_, Option<Vec<u8>>>(idx).map(Field::Binary),
            _ => row
                .try_get::<_, Option<String>>(idx)
                .ok()
                .flatten()
                .map(Field::String),
        }
        .unwrap_or(Field::Null);
        map.insert(name, value);
    }
    map
}

/// `nativeToUnified` (spec §4.1): total, falls back to `"string"` for any
/// unrecognized `information_schema.columns.data_type` value.
pub fn native_to_unified(native_type: &str) -> FieldType {
    match native_type.to_ascii_lowercase().as_str() {
        "boolean" => FieldType::Boolean,
        "smallint" | "integer" | "bigint" => FieldType::Int,
        "real" | "double precision" | "numeric" | "decimal" => FieldType::Float,
        "text" => FieldType::Text,
        "character varying" | "character" => FieldType::String,
        "json" | "jsonb" => FieldType::Json,
        "timestamp without time zone" | "timestamp with time zone" => FieldType::Timestamp,
        "date" => FieldType::Date,
        "bytea" => FieldType::Binary,
        "uuid" => FieldType::String,
        _ => FieldType::String,
    }
}

/// `unifiedToNative` (spec §4.1): total, falls back to the widest native
/// string type (`text`) for any unified kind that doesn't map cleanly.
pub fn unified_to_native(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "boolean",
        FieldType::Int | FieldType::UInt => "bigint",
        FieldType::Float | FieldType::Decimal => "double precision",
        FieldType::String => "varchar",
        FieldType::Text => "text",
        FieldType::Binary => "bytea",
        FieldType::Json => "jsonb",
        FieldType::Timestamp => "timestamp with time zone",
        FieldType::Date => "date",
        FieldType::Point => "point",
        FieldType::Duration => "interval",
        FieldType::Null => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_to_unified_falls_back_to_string_for_unknown_type() {
        assert_eq!(native_to_unified("some_exotic_extension_type"), FieldType::String);
    }

    #[test]
    fn unified_to_native_round_trips_common_kinds() {
        assert_eq!(unified_to_native(FieldType::Int), "bigint");
        assert_eq!(unified_to_native(FieldType::Json), "jsonb");
    }
}
