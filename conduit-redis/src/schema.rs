//! `SchemaOperator` for Redis (spec §4.1, §4.5): Redis declares no schema
//! at all, so discovery infers one by sampling keys. A "table" here is the
//! prefix of a key before its first `:` (the de facto namespacing
//! convention every Redis deployment in this workspace's pack uses), and
//! its columns are inferred from one sampled key's hash fields —
//! best-effort, never failing, per §4.1's "degrade gracefully" contract.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, SchemaOperator};
use conduit_types::{Column, Table, UnifiedModel};
use redis::AsyncCommands;
use std::collections::{BTreeMap, BTreeSet};

use crate::adapter::RedisConnection;
use crate::convert::guess_field_type;

pub struct RedisSchemaOperator {
    conn: RedisConnection,
}

impl RedisSchemaOperator {
    pub fn new(conn: RedisConnection) -> Self {
        RedisSchemaOperator { conn }
    }

    fn prefix_of(key: &str) -> String {
        key.split(':').next().unwrap_or(key).to_string()
    }
}

#[async_trait]
impl SchemaOperator for RedisSchemaOperator {
    async fn discover_schema(&self, _cx: &CancellationContext) -> ConduitResult<UnifiedModel> {
        let mut conn = self.conn.connection();
        let mut iter: redis::AsyncIter<'_, String> = match conn.scan().await {
            Ok(iter) => iter,
            Err(e) => {
                log::warn!("redis schema discovery: scan failed, returning empty model: {e}");
                return Ok(UnifiedModel::default());
            }
        };

        let mut prefixes: BTreeSet<String> = BTreeSet::new();
        let mut sample_key: BTreeMap<String, String> = BTreeMap::new();
        while let Some(key) = futures::StreamExt::next(&mut iter).await {
            let prefix = Self::prefix_of(&key);
            sample_key.entry(prefix.clone()).or_insert_with(|| key.clone());
            prefixes.insert(prefix);
        }
        drop(iter);

        let mut model = UnifiedModel::default();
        for prefix in prefixes {
            let mut columns = BTreeMap::new();
            columns.insert(
                "key".to_string(),
                Column { name: "key".to_string(), data_type: conduit_types::FieldType::String, native_type: None, nullable: false, default: None },
            );
            if let Some(key) = sample_key.get(&prefix) {
                let mut conn = self.conn.connection();
                if let Ok(fields) = conn.hgetall::<_, std::collections::HashMap<String, String>>(key).await {
                    for (field, value) in fields {
                        columns.insert(
                            field.clone(),
                            Column { name: field, data_type: guess_field_type(&value), native_type: None, nullable: true, default: None },
                        );
                    }
                }
            }
            model.tables.insert(
                prefix.clone(),
                Table { name: prefix, comment: None, columns, indexes: BTreeMap::new(), constraints: BTreeMap::new() },
            );
        }
        Ok(model)
    }

    async fn create_structure(&self, _cx: &CancellationContext, _model: &UnifiedModel) -> ConduitResult<()> {
        // Redis needs no prior declaration for any key shape: keys, hashes,
        // and their fields spring into existence on first write.
        Ok(())
    }

    async fn list_tables(&self, cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        Ok(self.discover_schema(cx).await?.tables.into_keys().collect())
    }

    async fn get_table_schema(&self, cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        let model = self.discover_schema(cx).await?;
        model.tables.get(name).cloned().ok_or_else(|| {
            conduit_contract::ConduitError::NotFound {
                backend: conduit_types::BackendKind::Redis,
                operation: "schema.get_table_schema",
                context: conduit_contract::context([("table", name.to_string())]),
            }
        })
    }
}
