//! `Execute` (spec §4.8 step 3): topologically sort, seed source nodes from
//! the caller's `sourceData`, then for each remaining node collect inputs
//! from already-executed predecessors and invoke the transformation.

use std::collections::BTreeMap;

use crate::dag::WorkflowDag;
use crate::error::{DagError, DagResult};
use crate::node::{NodeKind, Record, TransformationRegistry};

/// Fixed output-port name a `Source` node's seeded record is published
/// under, and the fixed input-port name a `Target` node's received record
/// is recorded under. Both nodes have exactly one port because the spec
/// models them as simple pass-through ends of the graph rather than
/// multi-port like `Transformation`.
pub const SOURCE_OUTPUT: &str = "out";
pub const TARGET_INPUT: &str = "in";

/// One node's published outputs, keyed by output-port name.
pub type NodeOutputs = BTreeMap<String, Record>;

/// Runs the workflow end to end, returning every node's outputs keyed by
/// node id (spec §4.8: "record outputs").
pub fn execute(
    dag: &WorkflowDag,
    registry: &TransformationRegistry,
    source_data: &BTreeMap<String, Record>,
) -> DagResult<BTreeMap<String, NodeOutputs>> {
    let mut outputs: BTreeMap<String, NodeOutputs> = BTreeMap::new();

    for id in dag.topological_order() {
        let node = dag.node(&id).expect("topological_order only yields real node ids");
        match &node.kind {
            NodeKind::Source => {
                let record = source_data.get(&id).cloned().unwrap_or_default();
                outputs.insert(id, [(SOURCE_OUTPUT.to_string(), record)].into_iter().collect());
            }
            NodeKind::Target => {
                let mut merged = Record::new();
                for (predecessor, edge) in dag.incoming(&id) {
                    if let Some(value) = outputs
                        .get(&predecessor.id)
                        .and_then(|o| o.get(&edge.output))
                    {
                        merged.extend(value.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                outputs.insert(id, [(TARGET_INPUT.to_string(), merged)].into_iter().collect());
            }
            NodeKind::Transformation { transformation_name } => {
                let spec = registry
                    .get(transformation_name)
                    .expect("build_dag already rejected unknown transformation names");

                let mut inputs: BTreeMap<String, Record> = BTreeMap::new();
                for (predecessor, edge) in dag.incoming(&id) {
                    if let Some(value) = outputs
                        .get(&predecessor.id)
                        .and_then(|o| o.get(&edge.output))
                    {
                        inputs.insert(edge.input.clone(), value.clone());
                    }
                }
                for port in &spec.inputs {
                    if !inputs.contains_key(&port.name) {
                        if let Some(default) = &port.default {
                            inputs.insert(
                                port.name.clone(),
                                [("value".to_string(), default.clone())].into_iter().collect(),
                            );
                        }
                    }
                }

                let result = (spec.run)(&inputs)
                    .map_err(|e| DagError::ExecutionFailed(transformation_name.clone(), e))?;
                outputs.insert(id, result);
            }
        }
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build_dag, EdgeSpec};
    use crate::node::{Cardinality, DagNode, NodeKind, Port, TransformationRegistry, TransformationSpec};
    use conduit_types::Field;
    use std::sync::Arc;

    fn uppercase_registry() -> TransformationRegistry {
        let mut registry = TransformationRegistry::new();
        registry.register(TransformationSpec {
            name: "uppercase".to_string(),
            cardinality: Cardinality::OneToOne,
            inputs: vec![Port::required("in")],
            outputs: vec!["out".to_string()],
            run: Arc::new(|inputs: &BTreeMap<String, Record>| {
                let record = inputs.get("in").cloned().unwrap_or_default();
                let mut out = Record::new();
                for (k, v) in record {
                    let transformed = match v {
                        Field::String(s) => Field::String(s.to_uppercase()),
                        other => other,
                    };
                    out.insert(k, transformed);
                }
                let mut result = BTreeMap::new();
                result.insert("out".to_string(), out);
                Ok(result)
            }),
        });
        registry
    }

    #[test]
    fn source_to_transformation_to_target_propagates_values() {
        let registry = uppercase_registry();
        let nodes = vec![
            DagNode { id: "s".to_string(), kind: NodeKind::Source },
            DagNode {
                id: "xf".to_string(),
                kind: NodeKind::Transformation { transformation_name: "uppercase".to_string() },
            },
            DagNode { id: "t".to_string(), kind: NodeKind::Target },
        ];
        let edges = vec![
            EdgeSpec { from_node: "s".to_string(), output: "out".to_string(), to_node: "xf".to_string(), input: "in".to_string() },
            EdgeSpec { from_node: "xf".to_string(), output: "out".to_string(), to_node: "t".to_string(), input: "in".to_string() },
        ];
        let dag = build_dag(nodes, edges, &registry).unwrap();

        let mut source_data = BTreeMap::new();
        let mut record = Record::new();
        record.insert("name".to_string(), Field::String("ada".to_string()));
        source_data.insert("s".to_string(), record);

        let outputs = execute(&dag, &registry, &source_data).unwrap();
        let target_record = &outputs["t"][TARGET_INPUT];
        assert_eq!(target_record.get("name"), Some(&Field::String("ADA".to_string())));
    }

    #[test]
    fn unwired_mandatory_input_falls_back_to_declared_default() {
        let mut registry = TransformationRegistry::new();
        registry.register(TransformationSpec {
            name: "default_name".to_string(),
            cardinality: Cardinality::OneToOne,
            inputs: vec![Port::optional("in", Field::String("anonymous".to_string()))],
            outputs: vec!["out".to_string()],
            run: Arc::new(|inputs: &BTreeMap<String, Record>| {
                let value = inputs.get("in").and_then(|r| r.get("value")).cloned().unwrap_or(Field::Null);
                let mut out = Record::new();
                out.insert("name".to_string(), value);
                let mut result = BTreeMap::new();
                result.insert("out".to_string(), out);
                Ok(result)
            }),
        });
        let nodes = vec![DagNode {
            id: "xf".to_string(),
            kind: NodeKind::Transformation { transformation_name: "default_name".to_string() },
        }];
        let dag = build_dag(nodes, Vec::new(), &registry).unwrap();
        let outputs = execute(&dag, &registry, &BTreeMap::new()).unwrap();
        assert_eq!(outputs["xf"]["out"].get("name"), Some(&Field::String("anonymous".to_string())));
    }
}
