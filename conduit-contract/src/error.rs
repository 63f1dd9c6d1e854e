use std::collections::BTreeMap;

use conduit_types::{BackendKind, BoxedError};
use thiserror::Error;

/// A small bag of free-form context attached to every [`ConduitError`],
/// e.g. `{"table": "users", "missing_field": "table_name"}`. Mirrors the
/// ad-hoc extra fields `dozer-core::errors::ExecutionError` variants carry
/// (`node`, `port`, `endpoint_name`, ...), generalized into one bag so the
/// error enum doesn't grow a new struct variant per caller.
pub type ErrorContext = BTreeMap<String, String>;

pub fn context(pairs: impl IntoIterator<Item = (&'static str, String)>) -> ErrorContext {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// The closed error-kind taxonomy from spec §7. Every variant carries the
/// backend it happened against and the operation name, because a caller
/// debugging a pipeline failure needs "which backend, which call" before
/// anything else — matching `dozer-core::errors::ExecutionError`'s
/// operation-named variant shape.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("[{backend}] {operation}: invalid data ({context:?})")]
    InvalidData {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: not found ({context:?})")]
    NotFound {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: already exists ({context:?})")]
    AlreadyExists {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: unsupported operation ({context:?})")]
    UnsupportedOperation {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: connection failure ({context:?})")]
    ConnectionFailure {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
        #[source]
        source: Option<BoxedError>,
    },

    #[error("[{backend}] {operation}: configuration error ({context:?})")]
    ConfigurationError {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: illegal state transition ({context:?})")]
    IllegalState {
        backend: BackendKind,
        operation: &'static str,
        context: ErrorContext,
    },

    #[error("[{backend}] {operation}: cancelled")]
    Cancelled {
        backend: BackendKind,
        operation: &'static str,
    },

    #[error("[{backend}] {operation}: internal error")]
    Internal {
        backend: BackendKind,
        operation: &'static str,
        #[source]
        source: BoxedError,
    },
}

impl ConduitError {
    pub fn backend(&self) -> BackendKind {
        match self {
            ConduitError::InvalidData { backend, .. }
            | ConduitError::NotFound { backend, .. }
            | ConduitError::AlreadyExists { backend, .. }
            | ConduitError::UnsupportedOperation { backend, .. }
            | ConduitError::ConnectionFailure { backend, .. }
            | ConduitError::ConfigurationError { backend, .. }
            | ConduitError::IllegalState { backend, .. }
            | ConduitError::Cancelled { backend, .. }
            | ConduitError::Internal { backend, .. } => *backend,
        }
    }

    pub fn invalid_data(
        backend: BackendKind,
        operation: &'static str,
        missing_field: impl Into<String>,
    ) -> Self {
        ConduitError::InvalidData {
            backend,
            operation,
            context: context([("missing_field", missing_field.into())]),
        }
    }

    pub fn unsupported(backend: BackendKind, operation: &'static str) -> Self {
        ConduitError::UnsupportedOperation {
            backend,
            operation,
            context: ErrorContext::new(),
        }
    }

    pub fn illegal_state(
        backend: BackendKind,
        operation: &'static str,
        from: impl Into<String>,
    ) -> Self {
        ConduitError::IllegalState {
            backend,
            operation,
            context: context([("from_state", from.into())]),
        }
    }
}

pub type ConduitResult<T> = Result<T, ConduitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_backend_and_operation() {
        let err = ConduitError::unsupported(BackendKind::ObjectStore, "replication.connect");
        let msg = err.to_string();
        assert!(msg.contains("object_store"));
        assert!(msg.contains("replication.connect"));
    }

    #[test]
    fn backend_accessor_matches_every_variant() {
        let err = ConduitError::illegal_state(BackendKind::Neo4j, "start", "active");
        assert_eq!(err.backend(), BackendKind::Neo4j);
    }
}
