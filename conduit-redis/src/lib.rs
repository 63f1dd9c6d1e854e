//! Redis backend adapter (spec §4.1/§4.2): key/hash-shaped data access
//! where `table` names a key pattern, best-effort prefix-based schema
//! discovery, `INFO`-based instance metadata, and the workspace's polling
//! CDC mechanism applied to a watched key pattern instead of a table or
//! label.

pub mod adapter;
pub mod applier;
pub mod convert;
pub mod data;
pub mod metadata;
pub mod quoting;
pub mod replication;
pub mod schema;

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, ReplicationConfig, ReplicationOperator};
use conduit_replication::source::CheckpointFn;
use conduit_replication::{EventHandler, ReplicationSource};
use conduit_types::BackendKind;

pub use adapter::{RedisAdapter, RedisConnection};
pub use applier::RedisCdcApplier;
pub use data::RedisDataOperator;
pub use metadata::RedisMetadataOperator;
pub use quoting::REDIS_QUOTER;
pub use replication::RedisPollingMechanism;
pub use schema::RedisSchemaOperator;

/// `ReplicationOperator` for Redis (spec §4.2): each configured tracked
/// entity is itself a key pattern (e.g. `session:*`), polled by its own
/// [`RedisPollingMechanism`] sharing the one pooled connection.
pub struct RedisReplicationOperator {
    connection: RedisConnection,
    handler: EventHandler,
    checkpoint_fn: Option<CheckpointFn>,
}

impl RedisReplicationOperator {
    pub fn new(connection: RedisConnection, handler: EventHandler, checkpoint_fn: Option<CheckpointFn>) -> Self {
        RedisReplicationOperator {
            connection,
            handler,
            checkpoint_fn,
        }
    }
}

#[async_trait]
impl ReplicationOperator for RedisReplicationOperator {
    type Source = ReplicationSource<RedisPollingMechanism>;

    async fn connect(&self, _cx: &CancellationContext, config: ReplicationConfig) -> ConduitResult<Self::Source> {
        let mut mechanisms = Vec::with_capacity(config.tracked_entities.len());
        for pattern in &config.tracked_entities {
            mechanisms.push(RedisPollingMechanism::new(pattern.clone(), self.connection.clone()));
        }

        Ok(ReplicationSource::new(
            BackendKind::Redis,
            config,
            mechanisms,
            self.handler.clone(),
            self.checkpoint_fn.clone(),
        ))
    }
}
