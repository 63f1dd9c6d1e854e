//! `Field` <-> Redis value conversion, applied only at the adapter
//! boundary (spec §9 "Dynamic maps as event payloads"). Redis values are
//! untyped byte strings on the wire; this module is the one place that
//! decides how a [`Field`] gets serialized to and parsed back from one.

use conduit_types::{Field, FieldType};

/// `unifiedToNative`/the write-path half of the boundary: every [`Field`]
/// becomes a plain Redis bulk string, the only primitive Redis actually
/// stores. Total — every variant has a textual form.
pub fn field_to_redis_string(field: &Field) -> String {
    field.to_display_string()
}

/// `nativeToUnified`'s read-path counterpart: a raw Redis string is handed
/// back as [`Field::String`] rather than re-inferring its original Rust
/// type, since Redis itself carries no type tag — callers that know a
/// field should be numeric convert it themselves. Total, never panics:
/// unknown/absent input becomes [`Field::Null`].
pub fn redis_string_to_field(raw: Option<String>) -> Field {
    match raw {
        Some(s) => Field::String(s),
        None => Field::Null,
    }
}

/// `nativeToUnified` (spec §4.1) for the discoverer's best-effort type
/// guess over a sampled value (Redis itself has no declared column types).
pub fn guess_field_type(value: &str) -> FieldType {
    if value.parse::<i64>().is_ok() {
        FieldType::Int
    } else if value.parse::<f64>().is_ok() {
        FieldType::Float
    } else if value == "true" || value == "false" {
        FieldType::Boolean
    } else {
        FieldType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_numeric_and_boolean_types() {
        assert_eq!(guess_field_type("42"), FieldType::Int);
        assert_eq!(guess_field_type("3.14"), FieldType::Float);
        assert_eq!(guess_field_type("true"), FieldType::Boolean);
        assert_eq!(guess_field_type("hello"), FieldType::String);
    }

    #[test]
    fn missing_value_converts_to_null() {
        assert_eq!(redis_string_to_field(None), Field::Null);
    }
}
