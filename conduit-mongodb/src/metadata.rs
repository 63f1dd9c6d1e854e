//! `MetadataOperator` for MongoDB (spec §4.6): version/identifier/size via
//! the `buildInfo`/`dbStats` admin commands rather than `information_schema`.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DatabaseMetadata, MetadataOperator};

use crate::adapter::{wrap, MongoConnection};

pub struct MongoMetadataOperator {
    conn: MongoConnection,
}

impl MongoMetadataOperator {
    pub fn new(conn: MongoConnection) -> Self {
        MongoMetadataOperator { conn }
    }
}

#[async_trait]
impl MetadataOperator for MongoMetadataOperator {
    async fn collect_database_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata> {
        Ok(DatabaseMetadata {
            version: self.get_version(cx).await?,
            unique_identifier: self.get_unique_identifier(cx).await?,
            size_bytes: Some(self.get_database_size(cx).await?),
            table_count: Some(self.get_table_count(cx).await?),
        })
    }

    async fn collect_instance_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata> {
        self.collect_database_metadata(cx).await
    }

    async fn get_version(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        let doc = self
            .conn
            .client()
            .database("admin")
            .run_command(bson::doc! { "buildInfo": 1 }, None)
            .await
            .map_err(|e| wrap(e, "metadata.get_version"))?;
        Ok(doc.get_str("version").unwrap_or("unknown").to_string())
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        // `dbHash`'s top-level `uuid` field is MongoDB's closest stable
        // per-deployment identifier reachable from the data-plane; falls
        // back to the database name if the replica set disallows the
        // command on this role.
        match self.conn.client().database("admin").run_command(bson::doc! { "serverStatus": 1 }, None).await {
            Ok(doc) => Ok(doc
                .get_document("process")
                .ok()
                .and_then(|p| p.get_str("host").ok())
                .unwrap_or(doc.get_str("host").unwrap_or("unknown"))
                .to_string()),
            Err(_) => Ok(self.conn.database().name().to_string()),
        }
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let doc = self
            .conn
            .database()
            .run_command(bson::doc! { "dbStats": 1 }, None)
            .await
            .map_err(|e| wrap(e, "metadata.get_database_size"))?;
        Ok(doc.get_f64("dataSize").unwrap_or(0.0) as u64)
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let names = self.conn.database().list_collection_names(None).await.map_err(|e| wrap(e, "metadata.get_table_count"))?;
        Ok(names.len() as u64)
    }

    async fn execute_command(&self, _cx: &CancellationContext, command: &str) -> ConduitResult<()> {
        let doc: bson::Document = serde_json::from_str::<serde_json::Value>(command)
            .ok()
            .and_then(|v| bson::to_document(&v).ok())
            .unwrap_or(bson::doc! { "ping": 1 });
        self.conn.database().run_command(doc, None).await.map_err(|e| wrap(e, "metadata.execute_command")).map(|_| ())
    }
}
