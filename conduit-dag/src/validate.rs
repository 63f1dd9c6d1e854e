//! `Validate` (spec §4.8 step 2): cycle detection is already enforced at
//! `build_dag` time by `daggy`'s own insertion check, so this pass covers
//! the remaining structural invariants — mandatory transformation inputs,
//! target in-degree, and a non-fatal warning for dangling source nodes.

use crate::dag::WorkflowDag;
use crate::error::{DagError, DagResult};
use crate::node::{NodeKind, TransformationRegistry};

/// Non-fatal observations (spec §4.8: "warn (not error) on source nodes
/// without outgoing edges").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning(pub String);

pub fn validate(dag: &WorkflowDag, registry: &TransformationRegistry) -> DagResult<Vec<ValidationWarning>> {
    let mut warnings = Vec::new();

    for id in dag.node_ids().map(str::to_string).collect::<Vec<_>>() {
        let node = dag.node(&id).expect("id came from dag.node_ids()");
        match &node.kind {
            NodeKind::Source => {
                if dag.outgoing_count(&id) == 0 {
                    warnings.push(ValidationWarning(format!(
                        "source node `{id}` has no outgoing edges"
                    )));
                }
            }
            NodeKind::Target => {
                if dag.incoming(&id).is_empty() {
                    return Err(DagError::TargetWithoutInput(id));
                }
            }
            NodeKind::Transformation { transformation_name } => {
                let spec = registry
                    .get(transformation_name)
                    .expect("build_dag already rejected unknown transformation names");
                let incoming = dag.incoming(&id);
                for input in &spec.inputs {
                    if !input.mandatory {
                        continue;
                    }
                    let wired = incoming.iter().any(|(_, edge)| edge.input == input.name);
                    if !wired && input.default.is_none() {
                        return Err(DagError::MissingMandatoryInput {
                            node: id.clone(),
                            input: input.name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build_dag, EdgeSpec};
    use crate::node::{Cardinality, DagNode, Port, TransformationSpec};
    use std::sync::Arc;

    fn registry_with_uppercase() -> TransformationRegistry {
        let mut registry = TransformationRegistry::new();
        registry.register(TransformationSpec {
            name: "uppercase".to_string(),
            cardinality: Cardinality::OneToOne,
            inputs: vec![Port::required("in")],
            outputs: vec!["out".to_string()],
            run: Arc::new(|_inputs| Ok(Default::default())),
        });
        registry
    }

    #[test]
    fn target_with_no_incoming_edges_is_rejected() {
        let registry = TransformationRegistry::new();
        let nodes = vec![DagNode {
            id: "t".to_string(),
            kind: crate::node::NodeKind::Target,
        }];
        let dag = build_dag(nodes, Vec::new(), &registry).unwrap();
        let err = validate(&dag, &registry).unwrap_err();
        assert!(matches!(err, DagError::TargetWithoutInput(_)));
    }

    #[test]
    fn transformation_missing_mandatory_input_is_rejected() {
        let registry = registry_with_uppercase();
        let nodes = vec![DagNode {
            id: "xf".to_string(),
            kind: crate::node::NodeKind::Transformation {
                transformation_name: "uppercase".to_string(),
            },
        }];
        let dag = build_dag(nodes, Vec::new(), &registry).unwrap();
        let err = validate(&dag, &registry).unwrap_err();
        assert!(matches!(err, DagError::MissingMandatoryInput { .. }));
    }

    #[test]
    fn source_with_no_outgoing_edges_only_warns() {
        let registry = TransformationRegistry::new();
        let nodes = vec![DagNode {
            id: "s".to_string(),
            kind: crate::node::NodeKind::Source,
        }];
        let dag = build_dag(nodes, Vec::new(), &registry).unwrap();
        let warnings = validate(&dag, &registry).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn fully_wired_graph_validates_cleanly() {
        let registry = registry_with_uppercase();
        let nodes = vec![
            DagNode {
                id: "s".to_string(),
                kind: crate::node::NodeKind::Source,
            },
            DagNode {
                id: "xf".to_string(),
                kind: crate::node::NodeKind::Transformation {
                    transformation_name: "uppercase".to_string(),
                },
            },
            DagNode {
                id: "t".to_string(),
                kind: crate::node::NodeKind::Target,
            },
        ];
        let edges = vec![
            EdgeSpec {
                from_node: "s".to_string(),
                output: "out".to_string(),
                to_node: "xf".to_string(),
                input: "in".to_string(),
            },
            EdgeSpec {
                from_node: "xf".to_string(),
                output: "out".to_string(),
                to_node: "t".to_string(),
                input: "in".to_string(),
            },
        ];
        let dag = build_dag(nodes, edges, &registry).unwrap();
        let warnings = validate(&dag, &registry).unwrap();
        assert!(warnings.is_empty());
    }
}
