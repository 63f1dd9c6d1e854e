//! `CdcApplier` for Redis (spec §4.3): unlike the relational/graph
//! backends, a Redis mutation's real identifier is the full key string,
//! not one of the fixed `id`/`node_id`/`row_id` metadata names
//! [`conduit_contract::resolve_where_keys`] looks for directly — this
//! applier's polling mechanism (see [`crate::replication`]) populates
//! `metadata.row_id` with the key, so the generic resolver still finds it,
//! then this applier reshapes it into the `{"key": ...}` predicate
//! [`crate::data::RedisDataOperator`] expects.

use async_trait::async_trait;
use conduit_contract::{
    filter_metadata_fields, resolve_where_keys, CDCEvent, CancellationContext, CdcApplier, ConduitError, ConduitResult,
    DataOperator,
};
use conduit_types::{BackendKind, Field, FieldMap};

use crate::data::RedisDataOperator;

pub struct RedisCdcApplier {
    data: RedisDataOperator,
}

impl RedisCdcApplier {
    pub fn new(data: RedisDataOperator) -> Self {
        RedisCdcApplier { data }
    }

    fn resolve_key(event: &CDCEvent) -> ConduitResult<String> {
        let resolved = resolve_where_keys(BackendKind::Redis, "apply", &event.metadata, &event.old_data, &event.data)?;
        resolved
            .get("row_id")
            .or_else(|| resolved.get("key"))
            .and_then(Field::as_str)
            .map(str::to_string)
            .ok_or_else(|| ConduitError::invalid_data(BackendKind::Redis, "apply", "metadata.row_id|old_data.key|data.key"))
    }
}

#[async_trait]
impl CdcApplier for RedisCdcApplier {
    fn backend(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn apply_insert(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let data = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        self.data.insert(cx, &event.table_name, &[data]).await?;
        Ok(())
    }

    async fn apply_update(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let key = Self::resolve_key(event)?;
        let where_keys: FieldMap = [("key".to_string(), Field::String(key))].into_iter().collect();
        let mut set = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        set.remove("key");
        let affected = self.data.update(cx, &event.table_name, &set, &where_keys).await?;
        if affected == 0 {
            log::info!("apply_update on `{}` matched zero keys; acknowledging", event.table_name);
        }
        Ok(())
    }

    async fn apply_delete(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let key = Self::resolve_key(event)?;
        let where_keys: FieldMap = [("key".to_string(), Field::String(key))].into_iter().collect();
        let affected = self.data.delete(cx, &event.table_name, &where_keys).await?;
        if affected == 0 {
            log::info!("apply_delete on `{}` matched zero keys; acknowledging", event.table_name);
        }
        Ok(())
    }

    async fn apply_truncate(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        self.data.wipe(cx, &event.table_name).await
    }
}
