use thiserror::Error;

#[derive(Debug, Error)]
pub enum DagError {
    #[error("node `{0}` already exists in the workflow")]
    DuplicateNode(String),

    #[error("edge references unknown node `{0}`")]
    UnknownNode(String),

    #[error("transformation node `{node}` references unknown transformation `{name}`")]
    UnknownTransformation { node: String, name: String },

    #[error("edge from `{0}` to `{1}` would create a cycle")]
    WouldCycle(String, String),

    #[error("transformation node `{node}` is missing required input `{input}`")]
    MissingMandatoryInput { node: String, input: String },

    #[error("target node `{0}` has no incoming edges")]
    TargetWithoutInput(String),

    #[error("transformation `{0}` invocation failed: {1}")]
    ExecutionFailed(String, String),
}

pub type DagResult<T> = Result<T, DagError>;
