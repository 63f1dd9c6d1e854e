//! `bson::Bson` <-> [`Field`] conversion (spec §9 "Dynamic maps as event
//! payloads") and the sampling-based `nativeToUnified` inference MongoDB
//! needs in place of a catalog lookup, since a collection carries no fixed
//! column types to read back.

use bson::{Bson, Document};
use conduit_types::{Field, FieldMap, FieldType};

/// Flattens one document into a [`FieldMap`], converting `_id` to its
/// string form so every other operator can treat it as an ordinary field
/// rather than special-casing `ObjectId`.
pub fn document_to_field_map(doc: &Document) -> FieldMap {
    let mut map = FieldMap::new();
    for (key, value) in doc {
        map.insert(key.clone(), bson_to_field(value));
    }
    map
}

pub fn field_map_to_document(map: &FieldMap) -> Document {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key.clone(), field_to_bson(value));
    }
    doc
}

pub fn bson_to_field(value: &Bson) -> Field {
    match value {
        Bson::Null => Field::Null,
        Bson::Boolean(b) => Field::Boolean(*b),
        Bson::Int32(i) => Field::Int(*i as i64),
        Bson::Int64(i) => Field::Int(*i),
        Bson::Double(f) => Field::Float(*f),
        Bson::String(s) => Field::String(s.clone()),
        Bson::Binary(b) => Field::Binary(b.bytes.clone()),
        Bson::ObjectId(oid) => Field::String(oid.to_hex()),
        Bson::DateTime(dt) => Field::Timestamp(dt.to_chrono()),
        Bson::Decimal128(d) => Field::String(d.to_string()),
        Bson::Array(_) | Bson::Document(_) => Field::Json(bson_to_json(value)),
        other => Field::String(other.to_string()),
    }
}

pub fn field_to_bson(field: &Field) -> Bson {
    match field {
        Field::Null => Bson::Null,
        Field::Boolean(b) => Bson::Boolean(*b),
        Field::Int(i) => Bson::Int64(*i),
        Field::UInt(u) => Bson::Int64(*u as i64),
        Field::Float(f) => Bson::Double(*f),
        Field::String(s) => Bson::String(s.clone()),
        Field::Binary(b) => Bson::Binary(bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: b.clone() }),
        Field::Timestamp(t) => Bson::DateTime(bson::DateTime::from_chrono(*t)),
        Field::Json(v) => json_to_bson(v),
    }
}

fn bson_to_json(value: &Bson) -> serde_json::Value {
    match value {
        Bson::Array(items) => serde_json::Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => {
            let mut map = serde_json::Map::new();
            for (k, v) in doc {
                map.insert(k.clone(), bson_to_json(v));
            }
            serde_json::Value::Object(map)
        }
        other => serde_json::to_value(bson_to_field(other).to_display_string()).unwrap_or(serde_json::Value::Null),
    }
}

fn json_to_bson(value: &serde_json::Value) -> Bson {
    match value {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Bson::String(s.clone()),
        serde_json::Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => {
            let mut doc = Document::new();
            for (k, v) in map {
                doc.insert(k.clone(), json_to_bson(v));
            }
            Bson::Document(doc)
        }
    }
}

/// `nativeToUnified` for MongoDB (spec §4.1): since there's no catalog
/// type to read, this maps the `bsonType` string `$jsonSchema` validators
/// and document sampling report, not a driver-level type name.
pub fn native_to_unified(bson_type: &str) -> FieldType {
    match bson_type {
        "bool" => FieldType::Boolean,
        "int" | "long" => FieldType::Int,
        "double" | "decimal" => FieldType::Float,
        "string" => FieldType::String,
        "binData" => FieldType::Binary,
        "date" | "timestamp" => FieldType::Timestamp,
        "objectId" => FieldType::String,
        "array" | "object" => FieldType::Json,
        _ => FieldType::String,
    }
}

/// The inverse, used when `create_structure` emits a `$jsonSchema`
/// validator from a [`conduit_types::Column`].
pub fn unified_to_bson_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "bool",
        FieldType::Int | FieldType::UInt => "long",
        FieldType::Float | FieldType::Decimal => "double",
        FieldType::String | FieldType::Text => "string",
        FieldType::Binary => "binData",
        FieldType::Timestamp | FieldType::Date => "date",
        FieldType::Json => "object",
        FieldType::Point => "object",
        FieldType::Duration => "string",
        FieldType::Null => "null",
    }
}

/// One pass over a sampled document's top-level `bsonType` per key, used
/// by [`crate::schema::MongoSchemaOperator::discover_schema`] to build a
/// per-field type vote across the sample rather than trusting a single
/// document's shape.
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Null => "null",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Decimal128(_) => "decimal",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        _ => "string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalar_fields_through_bson() {
        let field = Field::String("hello".to_string());
        assert_eq!(bson_to_field(&field_to_bson(&field)), field);

        let field = Field::Int(42);
        assert_eq!(bson_to_field(&field_to_bson(&field)), field);
    }

    #[test]
    fn maps_bson_type_names() {
        assert_eq!(native_to_unified("objectId"), FieldType::String);
        assert_eq!(native_to_unified("array"), FieldType::Json);
    }
}
