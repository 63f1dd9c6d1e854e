//! `DataOperator` for MongoDB (spec §4.1): `table` names a collection,
//! `where_keys`/`set` are plain [`FieldMap`]s translated to BSON filter and
//! update documents via [`crate::convert`].

use async_trait::async_trait;
use bson::Document;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, StreamParams, StreamResult};
use conduit_types::{BackendKind, FieldMap};
use futures::stream::TryStreamExt;
use mongodb::options::FindOptions;

use crate::adapter::{wrap, MongoConnection};
use crate::convert::{document_to_field_map, field_map_to_document};

pub struct MongoDataOperator {
    conn: MongoConnection,
}

impl MongoDataOperator {
    pub fn new(conn: MongoConnection) -> Self {
        MongoDataOperator { conn }
    }

    fn collection(&self, table: &str) -> mongodb::Collection<Document> {
        self.conn.database().collection::<Document>(table)
    }
}

#[async_trait]
impl DataOperator for MongoDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let options = FindOptions::builder().limit(limit as i64).build();
        let mut cursor = self.collection(table).find(None, options).await.map_err(|e| wrap(e, "data.fetch"))?;
        let mut rows = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| wrap(e, "data.fetch"))? {
            rows.push(document_to_field_map(&doc));
        }
        Ok(rows)
    }

    async fn fetch_with_columns(
        &self,
        _cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        let projection: Document = columns.iter().map(|c| (c.clone(), bson::Bson::Int32(1))).collect();
        let options = FindOptions::builder().limit(limit as i64).projection(projection).build();
        let mut cursor = self.collection(table).find(None, options).await.map_err(|e| wrap(e, "data.fetch_with_columns"))?;
        let mut rows = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| wrap(e, "data.fetch_with_columns"))? {
            rows.push(document_to_field_map(&doc));
        }
        Ok(rows)
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let docs: Vec<Document> = rows.iter().map(field_map_to_document).collect();
        let result = self.collection(table).insert_many(docs, None).await.map_err(|e| wrap(e, "data.insert"))?;
        Ok(result.inserted_ids.len())
    }

    async fn update(&self, _cx: &CancellationContext, table: &str, set: &FieldMap, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::MongoDb, "data.update", "where_keys"));
        }
        let filter = field_map_to_document(where_keys);
        let update = bson::doc! { "$set": field_map_to_document(set) };
        let result = self.collection(table).update_many(filter, update, None).await.map_err(|e| wrap(e, "data.update"))?;
        Ok(result.modified_count as usize)
    }

    async fn upsert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // No declared key to match on at this layer; mirrors every other
        // adapter's primary-key-less upsert fallback (replace by `_id` when
        // present, otherwise plain insert).
        let mut upserted = 0usize;
        for row in rows {
            let doc = field_map_to_document(row);
            match row.get("_id") {
                Some(id) => {
                    let filter = bson::doc! { "_id": crate::convert::field_to_bson(id) };
                    self.collection(table)
                        .replace_one(filter, doc, mongodb::options::ReplaceOptions::builder().upsert(true).build())
                        .await
                        .map_err(|e| wrap(e, "data.upsert"))?;
                }
                None => {
                    self.collection(table).insert_one(doc, None).await.map_err(|e| wrap(e, "data.upsert"))?;
                }
            }
            upserted += 1;
        }
        Ok(upserted)
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::MongoDb, "data.delete", "where_keys"));
        }
        let filter = field_map_to_document(where_keys);
        let result = self.collection(table).delete_many(filter, None).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(result.deleted_count as usize)
    }

    async fn stream(&self, _cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let batch_size = params.batch_size.max(1);
        let skip: u64 = params.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let options = FindOptions::builder().skip(skip).limit(batch_size as i64 + 1).build();
        let mut cursor = self.collection(&params.table).find(None, options).await.map_err(|e| wrap(e, "data.stream"))?;
        let mut data = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| wrap(e, "data.stream"))? {
            data.push(document_to_field_map(&doc));
        }
        let has_more = data.len() > batch_size;
        data.truncate(batch_size);
        let next_cursor = if has_more { Some((skip + batch_size as u64).to_string()) } else { None };
        Ok(StreamResult { data, has_more, cursor: next_cursor })
    }

    async fn execute_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<Vec<FieldMap>> {
        // MongoDB has no ad-hoc query language at the wire level; `query`
        // is treated as a JSON aggregation pipeline, the closest analogue
        // to a free-form SQL string this backend has.
        let pipeline: Vec<Document> = serde_json::from_str::<Vec<serde_json::Value>>(query)
            .map_err(|e| ConduitError::invalid_data(BackendKind::MongoDb, "data.execute_query", format!("pipeline JSON: {e}")))?
            .into_iter()
            .map(|v| bson::to_document(&v).unwrap_or_default())
            .collect();
        // Pipeline's target collection is its first stage's `$collection`
        // marker by convention here, since an aggregation pipeline alone
        // doesn't name one.
        let target = pipeline
            .first()
            .and_then(|stage| stage.get_str("$collection").ok())
            .unwrap_or("")
            .to_string();
        let rest: Vec<Document> = pipeline.into_iter().skip(if target.is_empty() { 0 } else { 1 }).collect();
        let mut cursor = self.collection(&target).aggregate(rest, None).await.map_err(|e| wrap(e, "data.execute_query"))?;
        let mut rows = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| wrap(e, "data.execute_query"))? {
            rows.push(document_to_field_map(&doc));
        }
        Ok(rows)
    }

    async fn execute_count_query(&self, cx: &CancellationContext, query: &str) -> ConduitResult<u64> {
        Ok(self.execute_query(cx, query).await?.len() as u64)
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let doc: Document = if filter.is_empty() {
            Document::new()
        } else {
            serde_json::from_str::<serde_json::Value>(filter)
                .ok()
                .and_then(|v| bson::to_document(&v).ok())
                .unwrap_or_default()
        };
        self.collection(table).count_documents(doc, None).await.map_err(|e| wrap(e, "data.get_row_count"))
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        self.collection(table).delete_many(Document::new(), None).await.map_err(|e| wrap(e, "data.wipe")).map(|_| ())
    }
}
