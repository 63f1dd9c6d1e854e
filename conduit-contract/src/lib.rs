//! The Unified Adapter Contract (C3): the operator traits every backend
//! implements, the normalized CDC event model, parse/apply, the error
//! taxonomy, identifier quoting, and the shared `CreateStructure` ordering
//! helper.

pub mod cancel;
pub mod cdc;
pub mod connection;
pub mod create_structure;
pub mod error;
pub mod operators;
pub mod quoting;

pub use cancel::{CancellationContext, StopSignal};
pub use cdc::{
    filter_metadata_fields, is_metadata_field, parse_event, resolve_where_keys, CDCEvent, CdcApplier,
    Operation, RawEvent,
};
pub use connection::{ConnectionDescriptor, ConnectionState, SecretOpener, TlsOptions};
pub use error::{context, ConduitError, ConduitResult, ErrorContext};
pub use operators::{
    Adapter, AdminOperator, ConsumedMessage, ConsumerOperator, DataOperator, DatabaseMetadata,
    DetectedChange, MetadataOperator, ProduceMessage, ProducerOperator, ReplicationConfig,
    ReplicationOperator, SchemaOperator, StreamParams, StreamResult, TopicMetadata,
};
pub use quoting::{FixedQuoter, Quoter};
