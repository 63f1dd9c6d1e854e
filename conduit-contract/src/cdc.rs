//! The normalized CDC event model (spec §3), parsing (§4.3) and the shared
//! apply skeleton every sink applier follows (§4.3, §6).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use conduit_types::{BackendKind, Field, FieldMap};
use serde_json::Value as JsonValue;

use crate::cancel::CancellationContext;
use crate::error::{ConduitError, ConduitResult};

/// The raw, backend-native shape a source hands to [`parse_event`] before
/// it becomes a [`CDCEvent`]. Kept as a JSON object rather than a typed
/// struct because its shape genuinely varies per backend (row-shaped for
/// relational sources, label/property-shaped for graph sources) — this is
/// the one place in the contract that matches spec §9's "dynamic maps as
/// event payloads" note literally, since the event hasn't been normalized
/// yet.
pub type RawEvent = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Truncate,
}

impl Operation {
    /// Case-insensitive mapping from a raw operation token to the closed
    /// `Operation` set, per spec §4.3: "`CREATE/INSERT → Insert`,
    /// `UPDATE/SET → Update`, `DELETE/REMOVE → Delete`, else error."
    /// `TRUNCATE` is accepted literally since it names itself.
    pub fn parse(raw: &str) -> Option<Operation> {
        match raw.to_ascii_uppercase().as_str() {
            "CREATE" | "INSERT" => Some(Operation::Insert),
            "UPDATE" | "SET" => Some(Operation::Update),
            "DELETE" | "REMOVE" => Some(Operation::Delete),
            "TRUNCATE" => Some(Operation::Truncate),
            _ => None,
        }
    }
}

/// The normalized currency of the pipeline (spec §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CDCEvent {
    pub operation: Operation,
    pub table_name: String,
    pub schema_name: Option<String>,
    pub data: FieldMap,
    pub old_data: FieldMap,
    pub lsn: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: FieldMap,
}

impl CDCEvent {
    /// Validation invariants from spec §3, checked on both parse and apply.
    pub fn validate(&self, backend: BackendKind) -> ConduitResult<()> {
        if self.table_name.is_empty() {
            return Err(ConduitError::invalid_data(backend, "cdc.validate", "table_name"));
        }
        match self.operation {
            Operation::Insert if self.data.is_empty() => {
                Err(ConduitError::invalid_data(backend, "cdc.validate", "data"))
            }
            Operation::Delete
                if self.old_data.is_empty()
                    && self.data.is_empty()
                    && !has_key_bearing_metadata(&self.metadata) =>
            {
                Err(ConduitError::invalid_data(
                    backend,
                    "cdc.validate",
                    "old_data|data|metadata id",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Metadata keys a sink applier's Insert path must strip out of `Data`
/// before building a mutation (spec §4.3 `isMetadataField`).
const METADATA_KEYS: &[&str] = &["lsn", "xid", "commit_ts", "__op", "__source_ts_ms"];

/// `isMetadataField` (spec §4.3): true for the fixed set above, any key
/// prefixed `_cdc_`, or a backend-supplied native metadata prefix (e.g.
/// `METADATA$` on `conduit-snowflake`). `_id` is deliberately NOT
/// metadata for `conduit-mongodb`, where it is a real column — callers
/// pass `None` for `native_prefix` there.
pub fn is_metadata_field(key: &str, native_prefix: Option<&str>) -> bool {
    METADATA_KEYS.contains(&key)
        || key.starts_with("_cdc_")
        || native_prefix.is_some_and(|prefix| key.starts_with(prefix))
}

/// Filters metadata keys out of an Insert's `Data` map (spec §4.3 "Insert"
/// skeleton step).
pub fn filter_metadata_fields(data: &FieldMap, native_prefix: Option<&str>) -> FieldMap {
    data.iter()
        .filter(|(k, _)| !is_metadata_field(k, native_prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn has_key_bearing_metadata(metadata: &FieldMap) -> bool {
    ["id", "node_id", "relationship_id", "row_id"]
        .iter()
        .any(|k| metadata.contains_key(*k))
}

/// Resolves the WHERE-clause key set for Update/Delete (spec §4.3):
/// "Prefer a key-bearing path when metadata carries a primary identifier
/// ... else construct a WHERE clause from `OldData`, falling back to
/// `Data` when `OldData` is empty." Returns `Err(InvalidData)` with no
/// mutation attempted when none of the three sources yields a non-empty
/// key set — "WHERE-less updates are a contract violation."
pub fn resolve_where_keys<'a>(
    backend: BackendKind,
    operation: &'static str,
    metadata: &'a FieldMap,
    old_data: &'a FieldMap,
    data: &'a FieldMap,
) -> ConduitResult<&'a FieldMap> {
    for id_key in ["id", "node_id", "relationship_id", "row_id"] {
        if metadata.contains_key(id_key) {
            // Key-bearing metadata path: callers reconstruct the match
            // predicate from `metadata` directly, so return it as the
            // resolved source.
            return Ok(metadata);
        }
    }
    if !old_data.is_empty() {
        return Ok(old_data);
    }
    if !data.is_empty() {
        return Ok(data);
    }
    Err(ConduitError::invalid_data(backend, operation, "old_data|data|metadata id"))
}

fn json_to_field_map(value: Option<&JsonValue>) -> FieldMap {
    match value {
        Some(JsonValue::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), Field::from(v.clone())))
            .collect(),
        _ => FieldMap::new(),
    }
}

fn parse_timestamp(raw: &RawEvent) -> DateTime<Utc> {
    match raw.get("timestamp") {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now),
        Some(JsonValue::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    }
}

fn parse_lsn(raw: &RawEvent) -> String {
    for key in ["lsn", "id", "node_id", "relationship_id", "row_id", "xid"] {
        if let Some(v) = raw.get(key) {
            return match v {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
    }
    String::new()
}

fn parse_table_name(raw: &RawEvent) -> Option<String> {
    if let Some(JsonValue::String(s)) = raw.get("table_name") {
        return Some(s.clone());
    }
    if let Some(JsonValue::Array(labels)) = raw.get("labels") {
        if let Some(JsonValue::String(first)) = labels.first() {
            return Some(first.clone());
        }
    }
    if let Some(JsonValue::String(rel)) = raw.get("relationship_type") {
        return Some(rel.clone());
    }
    None
}

fn parse_metadata(raw: &RawEvent) -> FieldMap {
    let mut metadata = FieldMap::new();
    for key in [
        "node_id",
        "relationship_id",
        "row_id",
        "start_node_id",
        "end_node_id",
        "type",
    ] {
        if let Some(v) = raw.get(key) {
            metadata.insert(key.to_string(), Field::from(v.clone()));
        }
    }
    for (k, v) in raw {
        if k.starts_with("METADATA$") {
            metadata.insert(k.clone(), Field::from(v.clone()));
        }
    }
    metadata
}

/// `ParseEvent` (spec §4.3): normalizes a backend-native raw event map into
/// a [`CDCEvent`]. Generic across the relational/graph shapes every
/// adapter in this workspace produces: relational sources populate
/// `table_name`/`data`/`old_data`; graph sources populate
/// `labels`/`properties`/`node_id` instead, folded into the same fields
/// here. Missing required fields produce `InvalidData` naming the missing
/// field, per spec.
pub fn parse_event(backend: BackendKind, raw: &RawEvent) -> ConduitResult<CDCEvent> {
    let operation_raw = raw
        .get("operation")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ConduitError::invalid_data(backend, "cdc.parse_event", "operation"))?;
    let operation = Operation::parse(operation_raw)
        .ok_or_else(|| ConduitError::invalid_data(backend, "cdc.parse_event", "operation"))?;

    let table_name = parse_table_name(raw)
        .ok_or_else(|| ConduitError::invalid_data(backend, "cdc.parse_event", "table_name"))?;

    let data = raw
        .get("data")
        .or_else(|| raw.get("properties"))
        .map(|v| json_to_field_map(Some(v)))
        .unwrap_or_default();
    let old_data = json_to_field_map(raw.get("old_data"));

    let schema_name = raw
        .get("schema_name")
        .and_then(JsonValue::as_str)
        .map(String::from);

    let event = CDCEvent {
        operation,
        table_name,
        schema_name,
        data,
        old_data,
        lsn: parse_lsn(raw),
        timestamp: parse_timestamp(raw),
        metadata: parse_metadata(raw),
    };

    event.validate(backend)?;
    Ok(event)
}

/// The per-backend sink applier contract (spec §4.3/§6's "per-backend sink
/// appliers"). `apply` dispatches on `event.operation` and calls the
/// matching method; implementors only need to supply the four mutation
/// primitives, not the dispatch or validation.
#[async_trait]
pub trait CdcApplier: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// The backend's native metadata-column prefix (e.g. `METADATA$` on
    /// Snowflake), passed to [`is_metadata_field`]. `None` when the
    /// backend has no such prefix.
    fn native_metadata_prefix(&self) -> Option<&str> {
        None
    }

    async fn apply_insert(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()>;
    async fn apply_update(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()>;
    async fn apply_delete(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()>;
    async fn apply_truncate(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()>;

    /// `ApplyCDCEvent` (spec §4.3): validates, then dispatches. Row-count
    /// mismatches are the applier methods' own concern, not this
    /// dispatcher's — per spec, they are logged and acknowledged, never
    /// surfaced as an error here.
    async fn apply(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        event.validate(self.backend())?;
        match event.operation {
            Operation::Insert => self.apply_insert(cx, event).await,
            Operation::Update => self.apply_update(cx, event).await,
            Operation::Delete => self.apply_delete(cx, event).await,
            Operation::Truncate => self.apply_truncate(cx, event).await,
        }
    }
}

pub type RawEventMap = BTreeMap<String, JsonValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: JsonValue) -> RawEvent {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn operation_parse_is_case_insensitive() {
        assert_eq!(Operation::parse("insert"), Some(Operation::Insert));
        assert_eq!(Operation::parse("CREATE"), Some(Operation::Insert));
        assert_eq!(Operation::parse("Set"), Some(Operation::Update));
        assert_eq!(Operation::parse("remove"), Some(Operation::Delete));
        assert_eq!(Operation::parse("bogus"), None);
    }

    #[test]
    fn insert_round_trip_relational() {
        let r = raw(json!({
            "operation": "INSERT",
            "table_name": "users",
            "data": {"id": 1, "name": "Ada"}
        }));
        let event = parse_event(BackendKind::Postgres, &r).unwrap();
        assert_eq!(event.operation, Operation::Insert);
        assert_eq!(event.table_name, "users");
        assert_eq!(event.data.get("name"), Some(&Field::String("Ada".into())));
    }

    #[test]
    fn graph_update_uses_labels_and_properties() {
        let r = raw(json!({
            "type": "node",
            "operation": "SET",
            "labels": ["Person"],
            "properties": {"name": "New"},
            "node_id": 42
        }));
        let event = parse_event(BackendKind::Neo4j, &r).unwrap();
        assert_eq!(event.table_name, "Person");
        assert_eq!(event.data.get("name"), Some(&Field::String("New".into())));
        assert_eq!(event.metadata.get("node_id"), Some(&Field::Int(42)));
    }

    #[test]
    fn missing_table_name_is_invalid_data() {
        let r = raw(json!({"operation": "INSERT", "data": {"a": 1}}));
        let err = parse_event(BackendKind::Postgres, &r).unwrap_err();
        assert!(matches!(err, ConduitError::InvalidData { .. }));
    }

    #[test]
    fn insert_requires_non_empty_data() {
        let r = raw(json!({"operation": "INSERT", "table_name": "t"}));
        let err = parse_event(BackendKind::Postgres, &r).unwrap_err();
        assert!(matches!(err, ConduitError::InvalidData { .. }));
    }

    #[test]
    fn delete_with_no_keys_at_all_is_invalid() {
        let r = raw(json!({"operation": "DELETE", "table_name": "t"}));
        let err = parse_event(BackendKind::Postgres, &r).unwrap_err();
        assert!(matches!(err, ConduitError::InvalidData { .. }));
    }

    #[test]
    fn delete_with_old_data_is_valid() {
        let r = raw(json!({"operation": "DELETE", "table_name": "t", "old_data": {"k": 7}}));
        let event = parse_event(BackendKind::Postgres, &r).unwrap();
        assert_eq!(event.old_data.get("k"), Some(&Field::Int(7)));
    }

    #[test]
    fn truncate_requires_only_table_name() {
        let r = raw(json!({"operation": "TRUNCATE", "table_name": "orders"}));
        let event = parse_event(BackendKind::Snowflake, &r).unwrap();
        assert_eq!(event.operation, Operation::Truncate);
    }

    #[test]
    fn is_metadata_field_recognizes_fixed_set_and_prefixes() {
        assert!(is_metadata_field("lsn", None));
        assert!(is_metadata_field("_cdc_seq", None));
        assert!(is_metadata_field("METADATA$ACTION", Some("METADATA$")));
        assert!(!is_metadata_field("_id", None));
        assert!(!is_metadata_field("name", None));
    }

    #[test]
    fn resolve_where_keys_prefers_metadata_id() {
        let metadata: FieldMap = [("node_id".to_string(), Field::Int(1))].into_iter().collect();
        let old_data = FieldMap::new();
        let data = FieldMap::new();
        let resolved = resolve_where_keys(BackendKind::Neo4j, "update", &metadata, &old_data, &data).unwrap();
        assert!(resolved.contains_key("node_id"));
    }

    #[test]
    fn resolve_where_keys_falls_back_to_data_when_old_data_empty() {
        let metadata = FieldMap::new();
        let old_data = FieldMap::new();
        let data: FieldMap = [("k".to_string(), Field::Int(7))].into_iter().collect();
        let resolved = resolve_where_keys(BackendKind::Postgres, "update", &metadata, &old_data, &data).unwrap();
        assert!(resolved.contains_key("k"));
    }

    #[test]
    fn resolve_where_keys_errors_with_nothing_to_match_on() {
        let empty = FieldMap::new();
        let err = resolve_where_keys(BackendKind::Postgres, "update", &empty, &empty, &empty).unwrap_err();
        assert!(matches!(err, ConduitError::InvalidData { .. }));
    }
}
