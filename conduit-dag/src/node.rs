//! The three node kinds a workflow is built from (spec §4.8): `Source`,
//! `Transformation`, `Target`.

use std::collections::BTreeMap;
use std::sync::Arc;

use conduit_types::Field;

/// How a transformation's declared inputs/outputs are packaged to the
/// underlying function (spec §4.8). Determines whether `execute` hands the
/// function a single record or a batch, and whether its output is spread
/// across multiple downstream edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
    Generator,
    Sink,
}

/// One named input or output on a transformation node.
#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub mandatory: bool,
    pub default: Option<Field>,
}

impl Port {
    pub fn required(name: impl Into<String>) -> Self {
        Port {
            name: name.into(),
            mandatory: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: Field) -> Self {
        Port {
            name: name.into(),
            mandatory: false,
            default: Some(default),
        }
    }
}

/// A single record's named fields flowing along one edge.
pub type Record = BTreeMap<String, Field>;

/// The callable body a `Transformation` node invokes once its inputs are
/// collected, resolved from the registry by name at `build_dag` time
/// (spec §4.8 step 1: "resolve each transformation node against the
/// registry; fail if a referenced transformation is unknown").
pub type TransformationFn = Arc<dyn Fn(&BTreeMap<String, Record>) -> Result<BTreeMap<String, Record>, String> + Send + Sync>;

#[derive(Clone)]
pub struct TransformationSpec {
    pub name: String,
    pub cardinality: Cardinality,
    pub inputs: Vec<Port>,
    pub outputs: Vec<String>,
    pub run: TransformationFn,
}

impl std::fmt::Debug for TransformationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationSpec")
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("inputs", &self.inputs.iter().map(|p| &p.name).collect::<Vec<_>>())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// A lookup table of named transformations a workflow can reference
/// (spec §4.8's "registry").
#[derive(Default, Clone)]
pub struct TransformationRegistry {
    specs: BTreeMap<String, TransformationSpec>,
}

impl TransformationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: TransformationSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&TransformationSpec> {
        self.specs.get(name)
    }
}

/// The three node kinds (spec §4.8).
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Seeded directly from the caller's `sourceData` at execute time; has
    /// no inputs of its own.
    Source,
    /// Resolved against a [`TransformationRegistry`] entry by name.
    Transformation { transformation_name: String },
    /// A terminal node; must have at least one incoming edge (spec §4.8
    /// step 2).
    Target,
}

#[derive(Debug, Clone)]
pub struct DagNode {
    pub id: String,
    pub kind: NodeKind,
}
