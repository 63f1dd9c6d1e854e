//! The shared `CreateStructure` dependency-order walk (spec §4.1, §4.5):
//! schemas → sequences → tables → views → constraints → indexes →
//! functions → procedures (constraints before indexes holds for graph
//! backends too, since it's already this order's relative placement).
//!
//! Implemented once here and called by every adapter's
//! `SchemaOperator::create_structure` with backend-specific step closures,
//! instead of six copies of the same ordering bug class (spec §4). Steps
//! are boxed futures rather than plain closures because every real step is
//! a driver round trip.

use std::future::Future;
use std::pin::Pin;

use conduit_types::UnifiedModel;

use crate::error::ConduitResult;

/// One step of the walk: a human-readable label (matches
/// [`conduit_types::UnifiedModel::CREATE_ORDER`]) and the future that
/// actually issues the DDL for that object kind.
pub struct CreateStep<'a> {
    pub label: &'static str,
    pub run: Pin<Box<dyn Future<Output = ConduitResult<()>> + Send + 'a>>,
}

impl<'a> CreateStep<'a> {
    pub fn new(label: &'static str, run: impl Future<Output = ConduitResult<()>> + Send + 'a) -> Self {
        CreateStep { label, run: Box::pin(run) }
    }
}

/// Whether the backend can wrap the whole walk in one transaction (spec
/// §4.5: "inside a single transaction when the backend is transactional
/// for DDL; otherwise it executes each step and reports the first
/// failure"). Transactional rollback itself is each backend's concern
/// (driver-specific); this helper only decides whether to stop at the
/// first failure (both modes do) versus whether failures already rolled
/// back prior steps (the caller's transaction, not this function's).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlTransactionality {
    Transactional,
    StepByStep,
}

/// Runs `steps` in the fixed order encoded by the caller (expected to match
/// [`conduit_types::UnifiedModel::CREATE_ORDER`]), stopping at the first
/// failure and returning it. `model` is accepted only so call sites that
/// want to assert "every populated object kind had a step" can do so; the
/// walk itself doesn't inspect it.
pub async fn run_create_structure(
    _model: &UnifiedModel,
    _mode: DdlTransactionality,
    steps: Vec<CreateStep<'_>>,
) -> ConduitResult<()> {
    for step in steps {
        step.run.await.map_err(|e| {
            log::warn!("create_structure: step `{}` failed: {e}", step.label);
            e
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConduitError;
    use conduit_types::BackendKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn empty_step_list_succeeds() {
        let model = UnifiedModel::default();
        let result = run_create_structure(&model, DdlTransactionality::StepByStep, Vec::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn runs_steps_in_the_order_given_and_stops_at_first_failure() {
        let model = UnifiedModel::default();
        let ran: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
        let order = AtomicUsize::new(0);
        let steps = vec![
            CreateStep::new("schemas", async {
                ran.lock().unwrap().push("schemas");
                order.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            CreateStep::new("tables", async {
                ran.lock().unwrap().push("tables");
                Err(ConduitError::unsupported(BackendKind::Postgres, "tables"))
            }),
            CreateStep::new("views", async {
                ran.lock().unwrap().push("views");
                Ok(())
            }),
        ];
        let result = run_create_structure(&model, DdlTransactionality::StepByStep, steps).await;
        assert!(result.is_err());
        assert_eq!(*ran.lock().unwrap(), vec!["schemas", "tables"]);
    }
}
