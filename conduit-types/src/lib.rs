//! Shared vocabulary for the conduit data-movement fabric: the closed
//! [`BackendKind`]/[`Capability`] registry, the backend-agnostic
//! [`UnifiedModel`], and the dynamic [`Field`] value every CDC payload is
//! built from.
//!
//! Every other crate in the workspace depends on this one and nothing else
//! in this crate depends on the rest of the workspace.

pub mod backend;
pub mod error;
pub mod field;
pub mod model;

/// Re-export of the `log` facade macros, so downstream crates write
/// `conduit_types::log::warn!(...)` the same way they reach for any other
/// shared vocabulary item, instead of each crate declaring its own `log`
/// dependency with a potentially different version.
pub mod log {
    pub use log::{debug, error, info, log, trace, warn, Level, LevelFilter};
}

pub use backend::{BackendKind, Capability, CdcMechanism, IdentifierCasePolicy};
pub use error::BoxedError;
pub use field::{Field, FieldMap, FieldType};
pub use model::{
    Column, Constraint, ConstraintType, ExternalTable, Function, Graph, Index, ModelViolation,
    Node, Procedure, Relationship, SearchDocument, Sequence, Schema as ModelSchema, Table,
    UnifiedModel, View,
};
