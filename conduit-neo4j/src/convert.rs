//! `BoltType` <-> [`Field`] conversion, applied only at the adapter
//! boundary (spec §9 "Dynamic maps as event payloads").

use conduit_types::{Field, FieldMap, FieldType};
use neo4rs::{BoltType, Node};

/// Flattens a [`Node`]'s properties into a [`FieldMap`], matching on
/// `BoltType` and falling back to `Field::Null` for the handful of exotic
/// Bolt kinds (spatial points, durations) this workspace's unified model
/// has no native representation for — total, never panics, same contract
/// as `conduit-postgres::convert::row_to_field_map`.
pub fn node_to_field_map(node: &Node) -> FieldMap {
    let mut map = FieldMap::new();
    for key in node.keys() {
        if let Some(value) = node.get::<BoltType>(key) {
            map.insert(key.to_string(), bolt_to_field(&value));
        }
    }
    map
}

fn bolt_to_field(value: &BoltType) -> Field {
    match value {
        BoltType::Null(_) => Field::Null,
        BoltType::Boolean(b) => Field::Boolean(b.value),
        BoltType::Integer(i) => Field::Int(i.value),
        BoltType::Float(f) => Field::Float(f.value),
        BoltType::String(s) => Field::String(s.value.clone()),
        BoltType::Bytes(b) => Field::Binary(b.value.to_vec()),
        BoltType::List(list) => {
            let values: Vec<serde_json::Value> = list.value.iter().map(bolt_to_json).collect();
            Field::Json(serde_json::Value::Array(values))
        }
        BoltType::Map(map) => Field::Json(bolt_map_to_json(map)),
        // Points, durations, and legacy temporal kinds have no unified
        // scalar equivalent; represented as their Cypher string form.
        other => Field::String(format!("{other:?}")),
    }
}

fn bolt_to_json(value: &BoltType) -> serde_json::Value {
    match bolt_to_field(value) {
        Field::Null => serde_json::Value::Null,
        Field::Boolean(b) => serde_json::Value::Bool(b),
        Field::Int(i) => serde_json::json!(i),
        Field::UInt(u) => serde_json::json!(u),
        Field::Float(f) => serde_json::json!(f),
        Field::String(s) => serde_json::Value::String(s),
        Field::Binary(b) => serde_json::Value::String(hex::encode(b)),
        Field::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        Field::Json(v) => v,
    }
}

fn bolt_map_to_json(map: &neo4rs::BoltMap) -> serde_json::Value {
    let mut json = serde_json::Map::new();
    for (key, value) in map.value.iter() {
        json.insert(key.value.clone(), bolt_to_json(value));
    }
    serde_json::Value::Object(json)
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }
}

/// `nativeToUnified` (spec §4.1): Neo4j property types map onto the
/// unified model one-to-one since Cypher's own type system is already
/// dynamic; falls back to `"string"`.
pub fn native_to_unified(native_type: &str) -> FieldType {
    match native_type.to_ascii_lowercase().as_str() {
        "boolean" => FieldType::Boolean,
        "integer" | "long" => FieldType::Int,
        "float" | "double" => FieldType::Float,
        "string" => FieldType::String,
        "bytearray" => FieldType::Binary,
        "localdatetime" | "datetime" | "date" => FieldType::Timestamp,
        "list" | "map" => FieldType::Json,
        _ => FieldType::String,
    }
}
