//! `DataOperator` for Redis (spec §4.1): `table` names a key pattern (e.g.
//! `session:*`); each row is one matching key, its Redis key name under
//! `"key"` and either its hash fields or a single `"value"` field for a
//! plain string key. `execute_query`/`execute_count_query` have no
//! Redis-native equivalent (no declarative query language over arbitrary
//! keys) and return [`ConduitError::UnsupportedOperation`] rather than
//! faking one.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, StreamParams, StreamResult};
use conduit_types::{BackendKind, Field, FieldMap};
use futures::StreamExt;
use redis::AsyncCommands;

use crate::adapter::{wrap, RedisConnection};
use crate::convert::{field_to_redis_string, redis_string_to_field};

pub struct RedisDataOperator {
    conn: RedisConnection,
}

impl RedisDataOperator {
    pub fn new(conn: RedisConnection) -> Self {
        RedisDataOperator { conn }
    }

    async fn key_to_row(&self, key: &str) -> ConduitResult<FieldMap> {
        let mut conn = self.conn.connection();
        let key_type: String = redis::cmd("TYPE").arg(key).query_async(&mut conn).await.map_err(|e| wrap(e, "data.fetch"))?;
        let mut row = FieldMap::new();
        row.insert("key".to_string(), Field::String(key.to_string()));
        if key_type == "hash" {
            let fields: std::collections::HashMap<String, String> = conn.hgetall(key).await.map_err(|e| wrap(e, "data.fetch"))?;
            for (k, v) in fields {
                row.insert(k, Field::String(v));
            }
        } else {
            let value: Option<String> = conn.get(key).await.map_err(|e| wrap(e, "data.fetch"))?;
            row.insert("value".to_string(), redis_string_to_field(value));
        }
        Ok(row)
    }

    async fn matching_keys(&self, pattern: &str, limit: usize) -> ConduitResult<Vec<String>> {
        let mut conn = self.conn.connection();
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(pattern).await.map_err(|e| wrap(e, "data.scan"))?;
        let mut keys = Vec::new();
        while let Some(key) = iter.next().await {
            keys.push(key);
            if keys.len() >= limit {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl DataOperator for RedisDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let keys = self.matching_keys(table, limit).await?;
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            rows.push(self.key_to_row(&key).await?);
        }
        Ok(rows)
    }

    async fn fetch_with_columns(
        &self,
        cx: &CancellationContext,
        table: &str,
        _columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        // A hash's field set is already sparse per key; no server-side
        // projection to push down.
        self.fetch(cx, table, limit).await
    }

    async fn insert(&self, _cx: &CancellationContext, _table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut conn = self.conn.connection();
        let mut inserted = 0usize;
        for row in rows {
            let key = match row.get("key").and_then(Field::as_str) {
                Some(k) => k.to_string(),
                None => return Err(ConduitError::invalid_data(BackendKind::Redis, "data.insert", "key")),
            };
            let fields: Vec<(String, String)> = row
                .iter()
                .filter(|(k, _)| k.as_str() != "key")
                .map(|(k, v)| (k.clone(), field_to_redis_string(v)))
                .collect();
            if fields.len() == 1 && fields[0].0 == "value" {
                let _: () = conn.set(&key, &fields[0].1).await.map_err(|e| wrap(e, "data.insert"))?;
            } else if !fields.is_empty() {
                let _: () = conn.hset_multiple(&key, &fields).await.map_err(|e| wrap(e, "data.insert"))?;
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        _cx: &CancellationContext,
        _table: &str,
        set: &FieldMap,
        where_keys: &FieldMap,
    ) -> ConduitResult<usize> {
        let key = where_keys
            .get("key")
            .and_then(Field::as_str)
            .ok_or_else(|| ConduitError::invalid_data(BackendKind::Redis, "data.update", "where_keys.key"))?;
        let mut conn = self.conn.connection();
        let fields: Vec<(String, String)> = set.iter().map(|(k, v)| (k.clone(), field_to_redis_string(v))).collect();
        if fields.len() == 1 && fields[0].0 == "value" {
            let _: () = conn.set(key, &fields[0].1).await.map_err(|e| wrap(e, "data.update"))?;
        } else if !fields.is_empty() {
            let _: () = conn.hset_multiple(key, &fields).await.map_err(|e| wrap(e, "data.update"))?;
        }
        Ok(1)
    }

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // Every Redis write (`SET`/`HSET`) is already an upsert; no
        // separate code path needed.
        self.insert(cx, table, rows).await
    }

    async fn delete(&self, _cx: &CancellationContext, _table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        let key = where_keys
            .get("key")
            .and_then(Field::as_str)
            .ok_or_else(|| ConduitError::invalid_data(BackendKind::Redis, "data.delete", "where_keys.key"))?;
        let mut conn = self.conn.connection();
        let removed: i64 = conn.del(key).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(removed as usize)
    }

    async fn stream(&self, cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let batch_size = params.batch_size.max(1);
        let mut data = self.fetch(cx, &params.table, batch_size + 1).await?;
        let has_more = data.len() > batch_size;
        data.truncate(batch_size);
        Ok(StreamResult { data, has_more, cursor: None })
    }

    async fn execute_query(&self, _cx: &CancellationContext, _query: &str) -> ConduitResult<Vec<FieldMap>> {
        Err(ConduitError::unsupported(BackendKind::Redis, "data.execute_query"))
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, _query: &str) -> ConduitResult<u64> {
        Err(ConduitError::unsupported(BackendKind::Redis, "data.execute_count_query"))
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let pattern = if filter.is_empty() { table } else { filter };
        let keys = self.matching_keys(pattern, usize::MAX).await?;
        Ok(keys.len() as u64)
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        let keys = self.matching_keys(table, usize::MAX).await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.connection();
        let _: () = conn.del(keys).await.map_err(|e| wrap(e, "data.wipe"))?;
        Ok(())
    }
}
