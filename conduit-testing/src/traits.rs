//! Adapter test fixture traits (spec §8), generalized from
//! `dozer-ingestion/tests/test_suite/mod.rs`'s
//! `DataReadyConnectorTest`/`InsertOnlyConnectorTest`/`CrudConnectorTest`
//! ladder: each adapter crate's own test module implements these against
//! its real backend (typically a docker-compose fixture), and the
//! scenario functions in [`crate::scenarios`] run the spec's literal
//! end-to-end checks against whatever implements them.

use conduit_contract::{CdcApplier, DataOperator, SchemaOperator};
use conduit_types::UnifiedModel;

/// A fixture that can hand back a connector already wired up against a
/// live (or locally-fixtured) backend instance, with no table/topic
/// assumptions yet.
pub trait DataReadyAdapterTest: Send + Sized + 'static {
    fn new() -> Self;

    fn schema(&self) -> &dyn SchemaOperator;

    fn data(&self) -> &dyn DataOperator;
}

/// A fixture that creates one table/label pre-populated with `model` and
/// no rows, used by scenarios 1-4 of spec §8.
pub trait InsertOnlyAdapterTest: Send + Sized + 'static {
    /// Creates a backend-native table/label for `table_name` matching
    /// `model` as closely as the backend can express; unsupported field
    /// kinds may be dropped rather than failing the whole fixture (same
    /// "do its best" contract as the teacher's `InsertOnlyConnectorTest`).
    fn new(table_name: String, model: UnifiedModel) -> Option<Self>;

    fn data(&self) -> &dyn DataOperator;

    fn applier(&self) -> &dyn CdcApplier;
}

/// A fixture additionally able to start a live replication source against
/// its table, used by scenario 5 (polling diff).
#[async_trait::async_trait]
pub trait CrudAdapterTest: InsertOnlyAdapterTest {
    /// Starts replication and returns a receiver that yields one
    /// [`conduit_contract::CDCEvent`] per detected change, in source order.
    async fn start_replication(&self) -> tokio::sync::mpsc::UnboundedReceiver<conduit_contract::CDCEvent>;
}
