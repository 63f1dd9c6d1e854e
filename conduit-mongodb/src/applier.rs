//! `CdcApplier` for MongoDB (spec §4.3): translates a normalized
//! [`CDCEvent`] into an insert/update/delete/wipe via
//! [`crate::data::MongoDataOperator`]. `_id` is a real document field here,
//! not backend metadata, so [`native_metadata_prefix`] stays `None`.

use async_trait::async_trait;
use conduit_contract::{
    filter_metadata_fields, resolve_where_keys, CDCEvent, CancellationContext, CdcApplier, ConduitResult, DataOperator,
};
use conduit_types::BackendKind;

use crate::data::MongoDataOperator;

pub struct MongoCdcApplier {
    data: MongoDataOperator,
}

impl MongoCdcApplier {
    pub fn new(data: MongoDataOperator) -> Self {
        MongoCdcApplier { data }
    }
}

#[async_trait]
impl CdcApplier for MongoCdcApplier {
    fn backend(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    async fn apply_insert(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let data = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        self.data.insert(cx, &event.table_name, &[data]).await?;
        Ok(())
    }

    async fn apply_update(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let where_keys = resolve_where_keys(BackendKind::MongoDb, "apply_update", &event.metadata, &event.old_data, &event.data)?;
        let set = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        let affected = self.data.update(cx, &event.table_name, &set, where_keys).await?;
        if affected == 0 {
            log::info!("apply_update on `{}` matched zero documents; acknowledging", event.table_name);
        }
        Ok(())
    }

    async fn apply_delete(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let where_keys = resolve_where_keys(BackendKind::MongoDb, "apply_delete", &event.metadata, &event.old_data, &event.data)?;
        let affected = self.data.delete(cx, &event.table_name, where_keys).await?;
        if affected == 0 {
            log::info!("apply_delete on `{}` matched zero documents; acknowledging", event.table_name);
        }
        Ok(())
    }

    async fn apply_truncate(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        self.data.wipe(cx, &event.table_name).await
    }
}
