//! Polling `ChangeMechanism` for Redis (spec §4.2 "Polling" strategy):
//! Redis keyspace notifications exist but require server-side
//! configuration (`notify-keyspace-events`) this core has no way to
//! guarantee is enabled, so — like `conduit-neo4j` — in-memory snapshot
//! diffing over a watched key pattern is this backend's only mechanism.
//! Snapshot is keyed by the full Redis key name; "row_id" in the emitted
//! raw event's metadata carries that key so
//! [`crate::applier::RedisCdcApplier`] can resolve a WHERE predicate from
//! it via the shared [`conduit_contract::resolve_where_keys`] path.

use std::collections::HashMap;

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DetectedChange};
use conduit_replication::ChangeMechanism;
use conduit_types::FieldMap;
use futures::StreamExt;
use redis::AsyncCommands;

use crate::adapter::{wrap, RedisConnection};
use crate::convert::redis_string_to_field;

pub struct RedisPollingMechanism {
    pattern: String,
    conn: RedisConnection,
    snapshot: HashMap<String, FieldMap>,
}

impl RedisPollingMechanism {
    pub fn new(pattern: String, conn: RedisConnection) -> Self {
        RedisPollingMechanism {
            pattern,
            conn,
            snapshot: HashMap::new(),
        }
    }

    async fn fetch_snapshot(&self) -> ConduitResult<HashMap<String, FieldMap>> {
        let mut conn = self.conn.connection();
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(&self.pattern).await.map_err(|e| wrap(e, "replication.poll"))?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next().await {
            keys.push(key);
        }
        drop(iter);

        let mut snapshot = HashMap::with_capacity(keys.len());
        for key in keys {
            let key_type: String = redis::cmd("TYPE").arg(&key).query_async(&mut conn).await.map_err(|e| wrap(e, "replication.poll"))?;
            let mut row = FieldMap::new();
            if key_type == "hash" {
                let fields: std::collections::HashMap<String, String> = conn.hgetall(&key).await.map_err(|e| wrap(e, "replication.poll"))?;
                for (k, v) in fields {
                    row.insert(k, redis_string_to_field(Some(v)));
                }
            } else {
                let value: Option<String> = conn.get(&key).await.map_err(|e| wrap(e, "replication.poll"))?;
                row.insert("value".to_string(), redis_string_to_field(value));
            }
            snapshot.insert(key, row);
        }
        Ok(snapshot)
    }

    /// Property equality by element count first, then stringified value
    /// per key (spec §4.2, same rule every polling mechanism in this
    /// workspace applies).
    fn rows_equal(a: &FieldMap, b: &FieldMap) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v.to_display_string() == other.to_display_string()))
    }

    fn raw_event(&self, operation: &str, key: &str, data: Option<&FieldMap>, old_data: Option<&FieldMap>) -> DetectedChange {
        let mut event = serde_json::Map::new();
        event.insert("operation".into(), operation.into());
        event.insert("table_name".into(), self.pattern.split(':').next().unwrap_or(&self.pattern).into());
        event.insert("row_id".into(), key.into());
        if let Some(data) = data {
            let mut full = data.clone();
            full.insert("key".to_string(), conduit_types::Field::String(key.to_string()));
            event.insert("data".into(), field_map_to_json(&full));
        }
        if let Some(old_data) = old_data {
            let mut full = old_data.clone();
            full.insert("key".to_string(), conduit_types::Field::String(key.to_string()));
            event.insert("old_data".into(), field_map_to_json(&full));
        }
        event
    }
}

fn field_map_to_json(map: &FieldMap) -> serde_json::Value {
    let mut json = serde_json::Map::new();
    for (k, v) in map {
        json.insert(k.clone(), serde_json::to_value(v.to_display_string()).unwrap_or(serde_json::Value::Null));
    }
    serde_json::Value::Object(json)
}

#[async_trait]
impl ChangeMechanism for RedisPollingMechanism {
    fn entity(&self) -> &str {
        &self.pattern
    }

    async fn probe(&mut self, _cx: &CancellationContext) -> ConduitResult<Vec<DetectedChange>> {
        let current = self.fetch_snapshot().await?;
        let mut changes = Vec::new();

        for (key, row) in &current {
            match self.snapshot.get(key) {
                None => changes.push(self.raw_event("INSERT", key, Some(row), None)),
                Some(previous) if !Self::rows_equal(previous, row) => {
                    changes.push(self.raw_event("SET", key, Some(row), Some(previous)))
                }
                Some(_) => {}
            }
        }
        for (key, previous) in &self.snapshot {
            if !current.contains_key(key) {
                changes.push(self.raw_event("DELETE", key, None, Some(previous)));
            }
        }

        self.snapshot = current;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_types::Field;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), Field::String(v.to_string()))).collect()
    }

    #[test]
    fn rows_equal_checks_count_then_stringified_value() {
        let a = fields(&[("value", "1")]);
        let b = fields(&[("value", "1")]);
        assert!(RedisPollingMechanism::rows_equal(&a, &b));

        let c = fields(&[("value", "1"), ("extra", "x")]);
        assert!(!RedisPollingMechanism::rows_equal(&a, &c));

        let d = fields(&[("value", "2")]);
        assert!(!RedisPollingMechanism::rows_equal(&a, &d));
    }
}
