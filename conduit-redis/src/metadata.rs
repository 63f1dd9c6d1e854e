//! `MetadataOperator` for Redis (spec §4.1): version/identifier/size via
//! the `INFO` command's text sections rather than `information_schema`.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DatabaseMetadata, MetadataOperator};

use crate::adapter::{wrap, RedisConnection};

pub struct RedisMetadataOperator {
    conn: RedisConnection,
}

impl RedisMetadataOperator {
    pub fn new(conn: RedisConnection) -> Self {
        RedisMetadataOperator { conn }
    }

    async fn info(&self) -> ConduitResult<String> {
        let mut conn = self.conn.connection();
        redis::cmd("INFO").query_async(&mut conn).await.map_err(|e| wrap(e, "metadata.info"))
    }

    fn info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
        info.lines().find_map(|line| line.strip_prefix(&format!("{field}:")))
    }
}

#[async_trait]
impl MetadataOperator for RedisMetadataOperator {
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
        let info = self.info().await?;
        Ok(Self::info_field(&info, "redis_version").unwrap_or("unknown").to_string())
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        let info = self.info().await?;
        Ok(Self::info_field(&info, "run_id").unwrap_or("unknown").to_string())
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let info = self.info().await?;
        Ok(Self::info_field(&info, "used_memory").and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let info = self.info().await?;
        Ok(Self::info_field(&info, "db0")
            .and_then(|v| v.split(',').next())
            .and_then(|kv| kv.strip_prefix("keys="))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    async fn execute_command(&self, _cx: &CancellationContext, command: &str) -> ConduitResult<()> {
        let mut conn = self.conn.connection();
        let parts: Vec<&str> = command.split_whitespace().collect();
        let (name, args) = parts.split_first().ok_or_else(|| {
            conduit_contract::ConduitError::invalid_data(conduit_types::BackendKind::Redis, "metadata.execute_command", "command")
        })?;
        let mut cmd = redis::cmd(name);
        for arg in args {
            cmd.arg(*arg);
        }
        let _: redis::Value = cmd.query_async(&mut conn).await.map_err(|e| wrap(e, "metadata.execute_command"))?;
        Ok(())
    }
}
