//! The operator trait families every backend implements (spec §4.1,
//! §4.6): `SchemaOperator`, `DataOperator`, `MetadataOperator`,
//! `ReplicationOperator` for data backends; `ProducerOperator`,
//! `ConsumerOperator`, `AdminOperator` for stream/broker backends.
//!
//! Every method takes a [`CancellationContext`] (spec §5). Default
//! 30-second timeouts are documented per method; a caller that needs a
//! different budget wraps the call with its own `tokio::time::timeout`
//! rather than this contract growing a timeout parameter on every method.

use async_trait::async_trait;
use conduit_types::{BackendKind, Capability, Field, FieldMap, UnifiedModel};

use crate::cancel::CancellationContext;
use crate::cdc::RawEvent;
use crate::error::ConduitResult;

/// `Adapter.Type`/`Adapter.Capabilities` plus the two connect entry points
/// (spec §4.1).
pub trait Adapter: Send + Sync {
    fn backend_kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capability {
        self.backend_kind().capabilities()
    }
}

/// Result of `DataOperator::stream` (spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub data: Vec<FieldMap>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamParams {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub cursor: Option<String>,
    pub batch_size: usize,
}

/// Read-only schema discovery and DDL (spec §4.1).
///
/// Default per-call timeout: 30s.
#[async_trait]
pub trait SchemaOperator: Send + Sync {
    /// Must enumerate every object kind the backend supports and degrade
    /// gracefully when an optional catalog extension is absent (spec
    /// §4.1/§4.5) — never fails outright.
    async fn discover_schema(&self, cx: &CancellationContext) -> ConduitResult<UnifiedModel>;

    /// Idempotent when the backend supports `IF NOT EXISTS`; otherwise
    /// fails with `AlreadyExists` on conflict. Walks the fixed order from
    /// [`crate::create_structure::CREATE_ORDER`].
    async fn create_structure(&self, cx: &CancellationContext, model: &UnifiedModel) -> ConduitResult<()>;

    async fn list_tables(&self, cx: &CancellationContext) -> ConduitResult<Vec<String>>;

    async fn get_table_schema(
        &self,
        cx: &CancellationContext,
        name: &str,
    ) -> ConduitResult<conduit_types::Table>;
}

/// Row-level data access (spec §4.1). Operations the backend cannot
/// support return `UnsupportedOperation` rather than silently degrading.
///
/// Default per-call timeout: 30s.
#[async_trait]
pub trait DataOperator: Send + Sync {
    async fn fetch(&self, cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>>;

    async fn fetch_with_columns(
        &self,
        cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>>;

    async fn insert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize>;

    async fn update(
        &self,
        cx: &CancellationContext,
        table: &str,
        set: &FieldMap,
        where_keys: &FieldMap,
    ) -> ConduitResult<usize>;

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize>;

    async fn delete(&self, cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize>;

    async fn stream(&self, cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult>;

    async fn execute_query(&self, cx: &CancellationContext, query: &str) -> ConduitResult<Vec<FieldMap>>;

    async fn execute_count_query(&self, cx: &CancellationContext, query: &str) -> ConduitResult<u64>;

    async fn get_row_count(&self, cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64>;

    async fn wipe(&self, cx: &CancellationContext, table: &str) -> ConduitResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseMetadata {
    pub version: String,
    pub unique_identifier: String,
    pub size_bytes: Option<u64>,
    pub table_count: Option<u64>,
}

/// Probes and administrative commands (spec §4.1).
///
/// Default per-call timeout: 30s.
#[async_trait]
pub trait MetadataOperator: Send + Sync {
    async fn collect_database_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata>;

    async fn collect_instance_metadata(&self, cx: &CancellationContext) -> ConduitResult<DatabaseMetadata>;

    async fn get_version(&self, cx: &CancellationContext) -> ConduitResult<String>;

    async fn get_unique_identifier(&self, cx: &CancellationContext) -> ConduitResult<String>;

    async fn get_database_size(&self, cx: &CancellationContext) -> ConduitResult<u64>;

    async fn get_table_count(&self, cx: &CancellationContext) -> ConduitResult<u64>;

    async fn execute_command(&self, cx: &CancellationContext, command: &str) -> ConduitResult<()>;
}

/// Per-backend options and watch-list for a replication run (spec §3
/// `ReplicationConfig`).
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    pub id: String,
    pub database_id: String,
    pub tracked_entities: Vec<String>,
    pub mechanism_hint: Option<conduit_types::CdcMechanism>,
    pub starting_position: Option<String>,
    /// Tick interval for polling-style mechanisms (spec §9 Open Question,
    /// resolved in DESIGN.md as a required configuration field defaulting
    /// to 1 second rather than a hardcoded constant).
    pub poll_interval: std::time::Duration,
    pub slot_name: Option<String>,
    pub publication_name: Option<String>,
    pub stream_names: Vec<String>,
    pub key_patterns: Vec<String>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            id: String::new(),
            database_id: String::new(),
            tracked_entities: Vec::new(),
            mechanism_hint: None,
            starting_position: None,
            poll_interval: std::time::Duration::from_secs(1),
            slot_name: None,
            publication_name: None,
            stream_names: Vec::new(),
            key_patterns: Vec::new(),
        }
    }
}

/// `Connect(config) -> ReplicationSource` (spec §4.2). Implementors return
/// a handle from `conduit-replication`'s generic lifecycle, parameterized
/// with their own change-detection mechanism.
#[async_trait]
pub trait ReplicationOperator: Send + Sync {
    type Source: Send + Sync;

    async fn connect(&self, cx: &CancellationContext, config: ReplicationConfig) -> ConduitResult<Self::Source>;
}

/// Produced by [`ChangeMechanism::probe`] in `conduit-replication`: one
/// detected change, not yet normalized into a [`crate::cdc::CDCEvent`].
pub type DetectedChange = RawEvent;

#[derive(Debug, Clone)]
pub struct ProduceMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: FieldMap,
}

/// Broker producer (spec §4.6).
#[async_trait]
pub trait ProducerOperator: Send + Sync {
    async fn produce(&self, cx: &CancellationContext, topic: &str, messages: &[ProduceMessage]) -> ConduitResult<usize>;

    /// Dispatches a background task and invokes `on_complete` when the
    /// underlying batch lands (spec §4.6 "dispatches a fiber").
    async fn produce_async(
        &self,
        cx: &CancellationContext,
        topic: &str,
        messages: Vec<ProduceMessage>,
        on_complete: Box<dyn FnOnce(ConduitResult<usize>) + Send>,
    ) -> ConduitResult<()>;

    async fn flush(&self, cx: &CancellationContext) -> ConduitResult<()>;

    async fn close(&self) -> ConduitResult<()>;
}

#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

/// Broker consumer (spec §4.6). `consume` blocks, invoking `handler` once
/// per message, returning only on cancellation or a fatal error; for
/// partitioned backends one internal worker per assigned partition fans
/// out, with no cross-partition ordering guarantee.
#[async_trait]
pub trait ConsumerOperator: Send + Sync {
    async fn subscribe(&self, cx: &CancellationContext, topics: &[String], group_id: &str) -> ConduitResult<()>;

    async fn consume(
        &self,
        cx: &CancellationContext,
        handler: Box<dyn Fn(ConsumedMessage) -> ConduitResult<()> + Send + Sync>,
    ) -> ConduitResult<()>;

    async fn commit(&self, _cx: &CancellationContext) -> ConduitResult<()> {
        Err(crate::error::ConduitError::unsupported(self.backend(), "consumer.commit"))
    }

    async fn seek(&self, _cx: &CancellationContext, _topic: &str, _partition: i32, _offset: i64) -> ConduitResult<()> {
        Err(crate::error::ConduitError::unsupported(self.backend(), "consumer.seek"))
    }

    fn backend(&self) -> BackendKind;
}

#[derive(Debug, Clone, Default)]
pub struct TopicMetadata {
    pub name: String,
    pub partition_count: usize,
    pub replication_factor: usize,
}

/// Broker admin surface (spec §4.6). Backends needing out-of-band control
/// (a cloud resource-manager API) return `UnsupportedOperation`.
#[async_trait]
pub trait AdminOperator: Send + Sync {
    async fn list_topics(&self, cx: &CancellationContext) -> ConduitResult<Vec<String>>;

    async fn create_topic(&self, cx: &CancellationContext, name: &str, partitions: usize) -> ConduitResult<()>;

    async fn delete_topic(&self, cx: &CancellationContext, name: &str) -> ConduitResult<()>;

    async fn get_topic_metadata(&self, cx: &CancellationContext, name: &str) -> ConduitResult<TopicMetadata>;

    async fn get_topic_config(&self, cx: &CancellationContext, name: &str) -> ConduitResult<FieldMap>;
}

/// Helper used by sink appliers building a backend-native WHERE/MATCH
/// predicate from a resolved key set (spec §4.3). Not a trait method
/// because every backend's query-building differs too much to share a
/// body, but the predicate *shape* (`column = value AND ...`, ordered by
/// key name for determinism) is common enough to live here once.
pub fn ordered_predicate_pairs(keys: &FieldMap) -> Vec<(&String, &Field)> {
    keys.iter().collect()
}
