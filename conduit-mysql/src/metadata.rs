use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DatabaseMetadata, MetadataOperator};
use mysql_async::prelude::*;

use crate::adapter::{wrap, MySqlConnection};

pub struct MySqlMetadataOperator {
    conn: MySqlConnection,
}

impl MySqlMetadataOperator {
    pub fn new(conn: MySqlConnection) -> Self {
        MySqlMetadataOperator { conn }
    }
}

#[async_trait]
impl MetadataOperator for MySqlMetadataOperator {
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
        let mut conn = self.conn.conn().await?;
        let version: Option<String> = conn.query_first("SELECT VERSION()").await.map_err(|e| wrap(e, "metadata.get_version"))?;
        Ok(version.unwrap_or_default())
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        let mut conn = self.conn.conn().await?;
        let uuid: Option<String> = conn
            .query_first("SELECT @@server_uuid")
            .await
            .map_err(|e| wrap(e, "metadata.get_unique_identifier"))?;
        Ok(uuid.unwrap_or_default())
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let mut conn = self.conn.conn().await?;
        let size: Option<f64> = conn
            .query_first(
                "SELECT COALESCE(SUM(data_length + index_length), 0) \
                 FROM information_schema.tables WHERE table_schema = DATABASE()",
            )
            .await
            .map_err(|e| wrap(e, "metadata.get_database_size"))?;
        Ok(size.unwrap_or(0.0) as u64)
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let mut conn = self.conn.conn().await?;
        let count: Option<u64> = conn
            .query_first(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'",
            )
            .await
            .map_err(|e| wrap(e, "metadata.get_table_count"))?;
        Ok(count.unwrap_or(0))
    }

    async fn execute_command(&self, _cx: &CancellationContext, command: &str) -> ConduitResult<()> {
        let mut conn = self.conn.conn().await?;
        conn.query_drop(command).await.map_err(|e| wrap(e, "metadata.execute_command"))
    }
}
