//! The Replication Source Lifecycle (C5): a generic, reusable
//! `ReplicationSource<M>` that every backend crate plugs a
//! [`ChangeMechanism`] into, carrying the CAS state machine, worker
//! spawn/join, stop signal, and checkpointed position mutex once, instead
//! of each connector crate reimplementing it (grounded on
//! `dozer-core::executor::source_node`'s sender/listener split and
//! `Arc<AtomicBool>` running flag).

pub mod mechanism;
pub mod source;

pub use mechanism::ChangeMechanism;
pub use source::{EventHandler, ReplicationSource, SourceState};
