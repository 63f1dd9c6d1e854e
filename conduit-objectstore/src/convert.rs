//! `nativeToUnified`/`unifiedToNative` for the object-store backend (spec
//! §4.1): total functions over the small set of Arrow-ish type names
//! Delta table schemas actually carry, grounded on the `FieldType`
//! vocabulary every adapter shares.

use conduit_types::FieldType;

/// Total: unknown input falls back to `"string"` per spec §4.1's total-function
/// invariant.
pub fn native_to_unified(native: &str) -> FieldType {
    match native.to_ascii_lowercase().as_str() {
        "boolean" | "bool" => FieldType::Boolean,
        "int" | "int32" | "integer" => FieldType::Int,
        "long" | "int64" | "bigint" => FieldType::Int,
        "short" | "int16" | "byte" | "int8" => FieldType::Int,
        "float" | "float32" => FieldType::Float,
        "double" | "float64" => FieldType::Float,
        "decimal" => FieldType::Decimal,
        "binary" => FieldType::Binary,
        "timestamp" | "timestampntz" => FieldType::Timestamp,
        "date" => FieldType::Date,
        "struct" | "map" | "array" => FieldType::Json,
        _ => FieldType::String,
    }
}

/// Total: unknown input falls back to the widest native string type
/// (`"string"`), per spec §4.1.
pub fn unified_to_native(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "boolean",
        FieldType::Int => "long",
        FieldType::UInt => "long",
        FieldType::Float => "double",
        FieldType::Decimal => "decimal",
        FieldType::String | FieldType::Text => "string",
        FieldType::Binary => "binary",
        FieldType::Json => "struct",
        FieldType::Timestamp => "timestamp",
        FieldType::Date => "date",
        FieldType::Point | FieldType::Duration | FieldType::Null => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_native_type_falls_back_to_string() {
        assert_eq!(native_to_unified("geography"), FieldType::String);
    }

    #[test]
    fn unified_to_native_is_total() {
        assert_eq!(unified_to_native(FieldType::Point), "string");
        assert_eq!(unified_to_native(FieldType::Int), "long");
    }
}
