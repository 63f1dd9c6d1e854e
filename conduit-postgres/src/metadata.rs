use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DatabaseMetadata, MetadataOperator};
use conduit_types::BackendKind;

use crate::adapter::PostgresConnection;

pub struct PostgresMetadataOperator {
    conn: PostgresConnection,
}

impl PostgresMetadataOperator {
    pub fn new(conn: PostgresConnection) -> Self {
        PostgresMetadataOperator { conn }
    }
}

fn wrap(e: tokio_postgres::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::Postgres,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl MetadataOperator for PostgresMetadataOperator {
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
        let row = self
            .conn
            .client()
            .query_one("SHOW server_version", &[])
            .await
            .map_err(|e| wrap(e, "metadata.get_version"))?;
        Ok(row.get(0))
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        let row = self
            .conn
            .client()
            .query_one("SELECT system_identifier::text FROM pg_control_system()", &[])
            .await
            .map_err(|e| wrap(e, "metadata.get_unique_identifier"))?;
        Ok(row.get(0))
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let row = self
            .conn
            .client()
            .query_one("SELECT pg_database_size(current_database())", &[])
            .await
            .map_err(|e| wrap(e, "metadata.get_database_size"))?;
        let size: i64 = row.get(0);
        Ok(size as u64)
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let row = self
            .conn
            .client()
            .query_one(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema')",
                &[],
            )
            .await
            .map_err(|e| wrap(e, "metadata.get_table_count"))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    async fn execute_command(&self, _cx: &CancellationContext, command: &str) -> ConduitResult<()> {
        self.conn
            .client()
            .batch_execute(command)
            .await
            .map_err(|e| wrap(e, "metadata.execute_command"))
    }
}
