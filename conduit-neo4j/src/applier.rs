//! `CdcApplier` for Neo4j (spec §4.3): every `Insert` degrades to a `MERGE`
//! rather than a blind `CREATE`, since polling-diff CDC (spec §4.2) can
//! redeliver the same detected change if a poll cycle overlaps a prior one
//! — `conduit-neo4j` has no WAL-style offset to dedupe against, unlike the
//! log-based backends, so idempotency has to live in the applier itself
//! (DESIGN.md: Open Question "Neo4j Insert/Update semantics" resolved this
//! way).

use async_trait::async_trait;
use conduit_contract::{
    filter_metadata_fields, resolve_where_keys, CDCEvent, CancellationContext, CdcApplier, ConduitResult, DataOperator,
};
use conduit_types::BackendKind;

use crate::data::Neo4jDataOperator;

pub struct Neo4jCdcApplier {
    data: Neo4jDataOperator,
}

impl Neo4jCdcApplier {
    pub fn new(data: Neo4jDataOperator) -> Self {
        Neo4jCdcApplier { data }
    }
}

#[async_trait]
impl CdcApplier for Neo4jCdcApplier {
    fn backend(&self) -> BackendKind {
        BackendKind::Neo4j
    }

    async fn apply_insert(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let data = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        self.data.upsert(cx, &event.table_name, &[data]).await?;
        Ok(())
    }

    async fn apply_update(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let where_keys = resolve_where_keys(
            BackendKind::Neo4j,
            "apply_update",
            &event.metadata,
            &event.old_data,
            &event.data,
        )?;
        let set = filter_metadata_fields(&event.data, self.native_metadata_prefix());
        self.data.update(cx, &event.table_name, &set, where_keys).await?;
        Ok(())
    }

    async fn apply_delete(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        let where_keys = resolve_where_keys(
            BackendKind::Neo4j,
            "apply_delete",
            &event.metadata,
            &event.old_data,
            &event.data,
        )?;
        let affected = self.data.delete(cx, &event.table_name, where_keys).await?;
        if affected == 0 {
            log::info!("apply_delete on label `{}` matched zero nodes; acknowledging", event.table_name);
        }
        Ok(())
    }

    async fn apply_truncate(&self, cx: &CancellationContext, event: &CDCEvent) -> ConduitResult<()> {
        self.data.wipe(cx, &event.table_name).await
    }
}
