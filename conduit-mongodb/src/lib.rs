//! MongoDB backend adapter (spec §4.1/§4.2): document-sampling schema
//! inference, collection-shaped data access, instance metadata via
//! `buildInfo`/`dbStats`, and a native change-stream CDC source with a
//! matching sink applier.

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

pub use adapter::{MongoAdapter, MongoConnection};
pub use applier::MongoCdcApplier;
pub use data::MongoDataOperator;
pub use metadata::MongoMetadataOperator;
pub use quoting::MONGODB_QUOTER;
pub use replication::MongoChangeStreamMechanism;
pub use schema::MongoSchemaOperator;

/// `ReplicationOperator` for MongoDB (spec §4.2): each tracked collection
/// gets its own change stream, all sharing the one already-pooled
/// `Client`.
pub struct MongoReplicationOperator {
    connection: MongoConnection,
    handler: EventHandler,
    checkpoint_fn: Option<CheckpointFn>,
}

impl MongoReplicationOperator {
    pub fn new(connection: MongoConnection, handler: EventHandler, checkpoint_fn: Option<CheckpointFn>) -> Self {
        MongoReplicationOperator { connection, handler, checkpoint_fn }
    }
}

#[async_trait]
impl ReplicationOperator for MongoReplicationOperator {
    type Source = ReplicationSource<MongoChangeStreamMechanism>;

    async fn connect(&self, _cx: &CancellationContext, config: ReplicationConfig) -> ConduitResult<Self::Source> {
        let starting_token = config
            .starting_position
            .as_deref()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
            .and_then(|v| bson::to_document(&v).ok());

        let mut mechanisms = Vec::with_capacity(config.tracked_entities.len());
        for collection in &config.tracked_entities {
            mechanisms.push(MongoChangeStreamMechanism::new(collection.clone(), self.connection.clone(), starting_token.clone()));
        }

        Ok(ReplicationSource::new(
            BackendKind::MongoDb,
            config,
            mechanisms,
            self.handler.clone(),
            self.checkpoint_fn.clone(),
        ))
    }
}
