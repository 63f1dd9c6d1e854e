//! The optional Transformation DAG Engine (C10, spec §4.8): workflows of
//! `Source`/`Transformation`/`Target` nodes wired by named
//! `(outputPort) -> (inputPort)` edges, built, validated for acyclicity
//! and input completeness, and executed in topological order.
//!
//! Grounded on `dozer-core::dag::dag_impl::Dag<T>` for the graph wrapper
//! shape and `dozer-core::dag::dag_schemas` for the "propagate in
//! topological order" execution model, generalized from DAG-of-processors
//! to DAG-of-named-transformations.

pub mod dag;
pub mod error;
pub mod execute;
pub mod node;
pub mod validate;

pub use dag::{build_dag, EdgeSpec, WorkflowDag};
pub use error::{DagError, DagResult};
pub use execute::{execute, NodeOutputs, SOURCE_OUTPUT, TARGET_INPUT};
pub use node::{Cardinality, DagNode, NodeKind, Port, Record, TransformationFn, TransformationRegistry, TransformationSpec};
pub use validate::{validate, ValidationWarning};
