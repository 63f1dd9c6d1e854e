//! Neo4j backend adapter (spec §4.1/§4.2): label/relationship-type schema
//! discovery with the two-dialect fallback (§4.5), row-shaped data access
//! over nodes, instance metadata via the `dbms.*` procedure surface, and
//! the workspace's reference polling CDC source (§4.2, §8 scenario 5) with
//! a replace-on-Insert/merge-on-Update sink applier.

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

pub use adapter::{Neo4jAdapter, Neo4jConnection};
pub use applier::Neo4jCdcApplier;
pub use data::Neo4jDataOperator;
pub use metadata::Neo4jMetadataOperator;
pub use quoting::NEO4J_QUOTER;
pub use replication::Neo4jPollingMechanism;
pub use schema::Neo4jSchemaOperator;

/// `ReplicationOperator` for Neo4j (spec §4.2): each tracked label gets its
/// own [`Neo4jPollingMechanism`] sharing the connection's already-pooled
/// `Graph` handle (no dedicated replication-mode session needed, unlike
/// Postgres/MySQL's log-based mechanisms).
pub struct Neo4jReplicationOperator {
    connection: Neo4jConnection,
    handler: EventHandler,
    checkpoint_fn: Option<CheckpointFn>,
}

impl Neo4jReplicationOperator {
    pub fn new(connection: Neo4jConnection, handler: EventHandler, checkpoint_fn: Option<CheckpointFn>) -> Self {
        Neo4jReplicationOperator {
            connection,
            handler,
            checkpoint_fn,
        }
    }
}

#[async_trait]
impl ReplicationOperator for Neo4jReplicationOperator {
    type Source = ReplicationSource<Neo4jPollingMechanism>;

    async fn connect(&self, _cx: &CancellationContext, config: ReplicationConfig) -> ConduitResult<Self::Source> {
        let mut mechanisms = Vec::with_capacity(config.tracked_entities.len());
        for label in &config.tracked_entities {
            mechanisms.push(Neo4jPollingMechanism::new(label.clone(), self.connection.graph().clone()));
        }

        Ok(ReplicationSource::new(
            BackendKind::Neo4j,
            config,
            mechanisms,
            self.handler.clone(),
            self.checkpoint_fn.clone(),
        ))
    }
}
