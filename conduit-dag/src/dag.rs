//! The workflow graph itself (spec §4.8 step 1 `BuildDAG`), grounded on
//! `dozer-core::dag::dag_impl::Dag<T>`'s wrapper-over-`daggy::Dag` shape:
//! a node-handle lookup table alongside the underlying `daggy::Dag`, and
//! `daggy`'s own cycle rejection on `add_edge` surfaced as a typed error
//! instead of a panic.

use std::collections::HashMap;

use daggy::Walker;

use crate::error::{DagError, DagResult};
use crate::node::{DagNode, NodeKind, TransformationRegistry};

#[derive(Debug, Clone)]
pub struct EdgeLabel {
    pub output: String,
    pub input: String,
}

/// One `(sourceNode, outputName) -> (targetNode, inputName)` wire (spec
/// §4.8).
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub from_node: String,
    pub output: String,
    pub to_node: String,
    pub input: String,
}

pub struct WorkflowDag {
    pub(crate) graph: daggy::Dag<DagNode, EdgeLabel>,
    pub(crate) lookup: HashMap<String, daggy::NodeIndex>,
}

impl WorkflowDag {
    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.lookup.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn incoming(&self, id: &str) -> Vec<(&DagNode, &EdgeLabel)> {
        let Some(&idx) = self.lookup.get(id) else {
            return Vec::new();
        };
        self.graph
            .parents(idx)
            .iter(&self.graph)
            .map(|(edge_idx, node_idx)| (&self.graph[node_idx], &self.graph[edge_idx]))
            .collect()
    }

    pub fn outgoing_count(&self, id: &str) -> usize {
        let Some(&idx) = self.lookup.get(id) else {
            return 0;
        };
        self.graph.children(idx).iter(&self.graph).count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.lookup.keys().map(String::as_str)
    }

    /// Topologically sorted node ids, used by [`crate::execute::execute`].
    /// A `daggy::Dag` cannot contain a cycle (every `add_edge` that would
    /// create one is rejected in [`build_dag`]), so this never fails.
    pub fn topological_order(&self) -> Vec<String> {
        petgraph::algo::toposort(self.graph.graph(), None)
            .expect("daggy::Dag is acyclic by construction")
            .into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }
}

/// `BuildDAG` (spec §4.8 step 1): resolves each transformation node against
/// `registry` and wires the declared edges, failing on an unknown
/// transformation name, a dangling edge endpoint, or an edge that would
/// close a cycle.
pub fn build_dag(
    nodes: Vec<DagNode>,
    edges: Vec<EdgeSpec>,
    registry: &TransformationRegistry,
) -> DagResult<WorkflowDag> {
    let mut graph = daggy::Dag::<DagNode, EdgeLabel>::new();
    let mut lookup = HashMap::new();

    for node in nodes {
        if lookup.contains_key(&node.id) {
            return Err(DagError::DuplicateNode(node.id));
        }
        if let NodeKind::Transformation { transformation_name } = &node.kind {
            if registry.get(transformation_name).is_none() {
                return Err(DagError::UnknownTransformation {
                    node: node.id,
                    name: transformation_name.clone(),
                });
            }
        }
        let id = node.id.clone();
        let idx = graph.add_node(node);
        lookup.insert(id, idx);
    }

    for edge in edges {
        let from_idx = *lookup
            .get(&edge.from_node)
            .ok_or_else(|| DagError::UnknownNode(edge.from_node.clone()))?;
        let to_idx = *lookup
            .get(&edge.to_node)
            .ok_or_else(|| DagError::UnknownNode(edge.to_node.clone()))?;
        graph
            .add_edge(
                from_idx,
                to_idx,
                EdgeLabel {
                    output: edge.output,
                    input: edge.input,
                },
            )
            .map_err(|_| DagError::WouldCycle(edge.from_node.clone(), edge.to_node.clone()))?;
    }

    Ok(WorkflowDag { graph, lookup })
}
