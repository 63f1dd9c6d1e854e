use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// The closed set of scalar kinds a [`Field`] can hold.
///
/// This is the backend-agnostic type vocabulary: every adapter's
/// `nativeToUnified`/`unifiedToNative` maps into and out of this set, never
/// directly into another adapter's native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Int,
    UInt,
    Float,
    Decimal,
    String,
    Text,
    Binary,
    Json,
    Timestamp,
    Date,
    Point,
    Duration,
    Null,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::UInt => "uint",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Binary => "binary",
            FieldType::Json => "json",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
            FieldType::Point => "point",
            FieldType::Duration => "duration",
            FieldType::Null => "null",
        };
        f.write_str(name)
    }
}

/// A dynamically-typed value.
///
/// [`FieldType`] is richer than this enum because it also has to describe
/// DDL-level distinctions ([`FieldType::Text`] vs [`FieldType::String`],
/// [`FieldType::Date`] vs [`FieldType::Timestamp`]) that a runtime value
/// doesn't need to carry separately; a `Field::String` may back a column
/// whose declared type is `Text`, and a `Field::Timestamp` may back a
/// `Date` column truncated to midnight. The adapter boundary is the only
/// place that needs to keep both views in sync.
///
/// This is the currency of every CDC payload
/// (`CDCEvent.Data`/`OldData`) and of sampled stream messages (C9): schemas
/// vary per backend and per table, so the core trades static typing for a
/// tagged sum type at the adapter boundary, per spec §9 "Dynamic maps as
/// event payloads".
///
/// Driver-native column types are converted to/from `Field` only at the
/// adapter boundary; nothing above that boundary matches on a driver type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Null,
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Boolean(_) => FieldType::Boolean,
            Field::Int(_) => FieldType::Int,
            Field::UInt(_) => FieldType::UInt,
            Field::Float(_) => FieldType::Float,
            Field::String(_) => FieldType::String,
            Field::Binary(_) => FieldType::Binary,
            Field::Timestamp(_) => FieldType::Timestamp,
            Field::Json(_) => FieldType::Json,
            Field::Null => FieldType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Best-effort string view, used by the transformation gateway's
    /// built-in `Uppercase`/`Lowercase` rules and by polling sources' diff
    /// algorithm (spec §4.2: "property equality ... then by stringified
    /// value per key").
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Stringified representation used for diffing and logging, never for
    /// building query text (that always goes through a [`crate::field`]
    /// consumer that knows how to bind a typed parameter).
    pub fn to_display_string(&self) -> String {
        match self {
            Field::Boolean(b) => b.to_string(),
            Field::Int(i) => i.to_string(),
            Field::UInt(u) => u.to_string(),
            Field::Float(f) => f.to_string(),
            Field::String(s) => s.clone(),
            Field::Binary(b) => format!("0x{}", b.iter().map(|b| format!("{b:02x}")).collect::<String>()),
            Field::Timestamp(t) => t.to_rfc3339(),
            Field::Json(v) => v.to_string(),
            Field::Null => "null".to_string(),
        }
    }
}

impl From<serde_json::Value> for Field {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Field::Null,
            serde_json::Value::Bool(b) => Field::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Field::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Field::UInt(u)
                } else {
                    Field::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Field::String(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => Field::Json(other),
        }
    }
}

/// A name-keyed row/property image, used for `CDCEvent.Data`/`OldData` and
/// for the schema-from-stream discoverer's sampled message fields.
pub type FieldMap = BTreeMap<String, Field>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_number_without_fraction_becomes_int() {
        let f: Field = serde_json::json!(42).into();
        assert_eq!(f, Field::Int(42));
    }

    #[test]
    fn json_object_becomes_json_field() {
        let f: Field = serde_json::json!({"a": 1}).into();
        assert!(matches!(f, Field::Json(_)));
    }

    #[test]
    fn null_field_reports_is_null() {
        assert!(Field::Null.is_null());
        assert!(!Field::Boolean(false).is_null());
    }

    #[test]
    fn display_string_never_panics_on_any_variant() {
        let fields = [
            Field::Boolean(true),
            Field::Int(-1),
            Field::UInt(1),
            Field::Float(1.5),
            Field::String("x".into()),
            Field::Binary(vec![0, 255]),
            Field::Json(serde_json::json!([1, 2])),
            Field::Null,
        ];
        for f in fields {
            let _ = f.to_display_string();
        }
    }
}
