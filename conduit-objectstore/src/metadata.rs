//! `MetadataOperator` for the object-store backend (spec §4.1): there is
//! no server to ask for a version or an instance-wide size, so these
//! probes report what can actually be computed from the store itself
//! (object count, total byte size) rather than faking a driver-reported
//! figure.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DatabaseMetadata, MetadataOperator};
use conduit_types::BackendKind;
use futures::StreamExt;

use crate::adapter::{wrap, ObjectStoreConnection};

pub struct ObjectStoreMetadataOperator {
    conn: ObjectStoreConnection,
}

impl ObjectStoreMetadataOperator {
    pub fn new(conn: ObjectStoreConnection) -> Self {
        ObjectStoreMetadataOperator { conn }
    }
}

#[async_trait]
impl MetadataOperator for ObjectStoreMetadataOperator {
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
        Ok(format!("object_store/{}", env!("CARGO_PKG_VERSION")))
    }

    async fn get_unique_identifier(&self, _cx: &CancellationContext) -> ConduitResult<String> {
        Ok(self.conn.root.clone())
    }

    async fn get_database_size(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let mut stream = self.conn.store.list(None);
        let mut total = 0u64;
        while let Some(item) = stream.next().await {
            total += item.map_err(|e| wrap(e, "metadata.size"))?.size as u64;
        }
        Ok(total)
    }

    async fn get_table_count(&self, _cx: &CancellationContext) -> ConduitResult<u64> {
        let mut stream = self.conn.store.list(None);
        let mut prefixes = std::collections::BTreeSet::new();
        while let Some(item) = stream.next().await {
            let meta = item.map_err(|e| wrap(e, "metadata.table_count"))?;
            if let Some(first) = meta.location.parts().next() {
                prefixes.insert(first.as_ref().to_string());
            }
        }
        Ok(prefixes.len() as u64)
    }

    async fn execute_command(&self, _cx: &CancellationContext, _command: &str) -> ConduitResult<()> {
        Err(ConduitError::unsupported(BackendKind::ObjectStore, "metadata.execute_command"))
    }
}
