//! Object-store backend adapter (spec §4.1, §4.7): file/object-level
//! schema and data access over `object_store`, with Delta Lake catalog
//! support layered on top for tables that carry a transaction log. No
//! `ReplicationOperator` is implemented — `BackendKind::ObjectStore`
//! declares `supports_cdc: false` (see `conduit_types::backend`), and
//! nothing in this crate constructs a replication source, which is the
//! stable compile-time guarantee spec §4.1/§7 asks for.

pub mod adapter;
pub mod convert;
pub mod data;
pub mod metadata;
pub mod quoting;
pub mod schema;

pub use adapter::{ObjectStoreAdapter, ObjectStoreConnection};
pub use data::ObjectStoreDataOperator;
pub use metadata::ObjectStoreMetadataOperator;
pub use quoting::OBJECTSTORE_QUOTER;
pub use schema::ObjectStoreSchemaOperator;
