//! `DataOperator` for the object-store backend (spec §4.1): rows are
//! object-level, not row-level — a "table" is a path prefix and each row
//! describes one object under it (`key`/`size`/`last_modified`, plus a
//! `bytes` field carrying the object body on `fetch`/`insert`). This is
//! coarser than the relational/document adapters' row granularity, which
//! matches the teacher's own treatment of object storage as a bulk,
//! snapshot-only backend (spec §4.7 "no CDC ... snapshot-only in this
//! corpus"). `execute_query`/`execute_count_query` have no object-store
//! equivalent and return [`ConduitError::UnsupportedOperation`].

use async_trait::async_trait;
use bytes::Bytes;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, StreamParams, StreamResult};
use conduit_types::{BackendKind, Field, FieldMap};
use futures::StreamExt;
use object_store::path::Path as ObjectPath;

use crate::adapter::{wrap, ObjectStoreConnection};

pub struct ObjectStoreDataOperator {
    conn: ObjectStoreConnection,
}

impl ObjectStoreDataOperator {
    pub fn new(conn: ObjectStoreConnection) -> Self {
        ObjectStoreDataOperator { conn }
    }

    fn object_path(&self, table: &str, key: &str) -> ObjectPath {
        ObjectPath::from(format!("{table}/{key}"))
    }

    async fn list_keys(&self, table: &str) -> ConduitResult<Vec<object_store::ObjectMeta>> {
        let prefix = ObjectPath::from(table);
        let mut stream = self.conn.store.list(Some(&prefix));
        let mut metas = Vec::new();
        while let Some(item) = stream.next().await {
            metas.push(item.map_err(|e| wrap(e, "data.list"))?);
        }
        Ok(metas)
    }

    fn meta_to_row(meta: &object_store::ObjectMeta) -> FieldMap {
        let mut row = FieldMap::new();
        row.insert("key".to_string(), Field::String(meta.location.to_string()));
        row.insert("size".to_string(), Field::UInt(meta.size as u64));
        row.insert("last_modified".to_string(), Field::Timestamp(meta.last_modified));
        row
    }
}

#[async_trait]
impl DataOperator for ObjectStoreDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let metas = self.list_keys(table).await?;
        Ok(metas.iter().take(limit).map(Self::meta_to_row).collect())
    }

    async fn fetch_with_columns(
        &self,
        cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        let rows = self.fetch(cx, table, limit).await?;
        if columns.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().filter(|(k, _)| columns.contains(k)).collect())
            .collect())
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut inserted = 0usize;
        for row in rows {
            let key = row
                .get("key")
                .and_then(Field::as_str)
                .ok_or_else(|| ConduitError::invalid_data(BackendKind::ObjectStore, "data.insert", "key"))?;
            let body: Bytes = match row.get("bytes") {
                Some(Field::Binary(b)) => Bytes::from(b.clone()),
                _ => {
                    let without_key: FieldMap = row.iter().filter(|(k, _)| k.as_str() != "key").map(|(k, v)| (k.clone(), v.clone())).collect();
                    Bytes::from(serde_json::to_vec(&without_key).unwrap_or_default())
                }
            };
            self.conn.store.put(&self.object_path(table, key), body).await.map_err(|e| wrap(e, "data.insert"))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        cx: &CancellationContext,
        table: &str,
        set: &FieldMap,
        where_keys: &FieldMap,
    ) -> ConduitResult<usize> {
        // Object storage has no in-place row update; an update is a full
        // overwrite of the object named by `where_keys.key`, per spec
        // §4.3's "WHERE-less updates are a contract violation" applied at
        // object granularity.
        let key = where_keys
            .get("key")
            .and_then(Field::as_str)
            .ok_or_else(|| ConduitError::invalid_data(BackendKind::ObjectStore, "data.update", "where_keys.key"))?;
        let mut row = set.clone();
        row.insert("key".to_string(), Field::String(key.to_string()));
        self.insert(cx, table, &[row]).await
    }

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        self.insert(cx, table, rows).await
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        let key = where_keys
            .get("key")
            .and_then(Field::as_str)
            .ok_or_else(|| ConduitError::invalid_data(BackendKind::ObjectStore, "data.delete", "where_keys.key"))?;
        self.conn.store.delete(&self.object_path(table, key)).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(1)
    }

    async fn stream(&self, cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let batch_size = params.batch_size.max(1);
        let offset: usize = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let mut rows = self.fetch(cx, &params.table, usize::MAX).await?;
        let total = rows.len();
        if offset >= total {
            return Ok(StreamResult { data: Vec::new(), has_more: false, cursor: None });
        }
        rows.drain(..offset);
        let has_more = rows.len() > batch_size;
        rows.truncate(batch_size);
        let cursor = if has_more { Some((offset + batch_size).to_string()) } else { None };
        Ok(StreamResult { data: rows, has_more, cursor })
    }

    async fn execute_query(&self, _cx: &CancellationContext, _query: &str) -> ConduitResult<Vec<FieldMap>> {
        Err(ConduitError::unsupported(BackendKind::ObjectStore, "data.execute_query"))
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, _query: &str) -> ConduitResult<u64> {
        Err(ConduitError::unsupported(BackendKind::ObjectStore, "data.execute_count_query"))
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, _filter: &str) -> ConduitResult<u64> {
        Ok(self.list_keys(table).await?.len() as u64)
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        let metas = self.list_keys(table).await?;
        for meta in metas {
            self.conn.store.delete(&meta.location).await.map_err(|e| wrap(e, "data.wipe"))?;
        }
        Ok(())
    }
}
