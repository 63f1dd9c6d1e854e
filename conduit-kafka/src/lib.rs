//! Kafka broker adapter (spec §4.1, §4.6, §4.7): stream producer/consumer/
//! admin surfaces (C8) plus the schema-from-stream discoverer (C9). Kafka
//! declares `supports_cdc: false` (see `conduit_types::backend`) — it is a
//! message bus, not a change-data source, so no `ReplicationOperator` is
//! implemented here; events flow the other direction, through
//! `ProducerOperator`/`ConsumerOperator`.

pub mod adapter;
pub mod admin;
pub mod consumer;
pub mod discovery;
pub mod producer;

pub use adapter::{KafkaAdapter, KafkaConnection};
pub use admin::KafkaAdminOperator;
pub use consumer::KafkaConsumerOperator;
pub use discovery::{InferredType, SchemaDiscoverer, TopicSchema};
pub use producer::KafkaProducerOperator;
