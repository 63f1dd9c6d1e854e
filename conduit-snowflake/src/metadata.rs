//! `MetadataOperator` for Snowflake (spec §4.1): version/identifier via
//! session functions, size via `ACCOUNT_USAGE` (best-effort — the role the
//! connection authenticates with may not have that share granted, in which
//! case size degrades to `None` rather than failing discovery).

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DatabaseMetadata, MetadataOperator};

use crate::adapter::SnowflakeConnection;

pub struct SnowflakeMetadataOperator {
    conn: SnowflakeConnection,
}

impl SnowflakeMetadataOperator {
    pub fn new(conn: SnowflakeConnection) -> Self {
        SnowflakeMetadataOperator { conn }
    }

    async fn scalar(&self, sql: &str) -> ConduitResult<Option<String>> {
        let rows = self.conn.query(sql).await?;
        Ok(rows.first().and_then(|row| row.values().next()).map(|f| f.to_display_string()))
    }
}

#[async_trait]
impl MetadataOperator for SnowflakeMetadataOperator {
    async fn collect_database_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata> {
        Ok(DatabaseMetadata {
            version: self.get_version(cx).await?,
            unique_identifier: self.get_unique_identifier(cx).await?,
            size_bytes: self.get_database_size(cx).await.ok(),
            table_count: self.get_table_count(cx).await.ok(),
        })
    }

    async fn collect_instance_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata> {
        self.collect_database_metadata(cx).await
    }

    async fn get_version(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        Ok(self.scalar("SELECT CURRENT_VERSION() AS V").await?.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        Ok(self
            .scalar("SELECT CURRENT_ACCOUNT() || '/' || CURRENT_DATABASE() AS ID")
            .await?
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let sql = "SELECT SUM(ACTIVE_BYTES) AS SZ FROM SNOWFLAKE.ACCOUNT_USAGE.TABLE_STORAGE_METRICS \
                    WHERE TABLE_CATALOG = CURRENT_DATABASE() AND DELETED = FALSE";
        match self.scalar(sql).await {
            Ok(v) => Ok(v.and_then(|s| s.parse().ok()).unwrap_or(0)),
            Err(e) => {
                log::warn!("get_database_size: ACCOUNT_USAGE not reachable from this role, reporting 0: {e}");
                Ok(0)
            }
        }
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let sql = "SELECT COUNT(*) AS CNT FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'";
        Ok(self.scalar(sql).await?.and_then(|s| s.parse().ok()).unwrap_or(0))
    }

    async fn execute_command(&self, _cx: &CancellationContext, command: &str) -> ConduitResult<()> {
        self.conn.execute(command).await?;
        Ok(())
    }
}
