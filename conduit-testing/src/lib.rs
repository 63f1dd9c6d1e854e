//! Shared CDC test-suite harness: fixture traits plus the five literal
//! end-to-end scenarios from spec §8, written once and run by every
//! backend adapter crate's own `#[cfg(test)]` (or `tests/`, for
//! backends needing a docker-compose fixture) module against its real
//! implementation.
//!
//! Grounded on `dozer-ingestion/tests/test_suite/mod.rs`'s trait ladder
//! and `basic.rs`/`records.rs` assertion style, generalized from
//! row-only CDC to this workspace's Insert/Update/Delete/Truncate model
//! across relational, graph, and document record shapes.

pub mod scenarios;
pub mod traits;

pub use scenarios::{
    delete_with_fallback_where, insert_round_trip, polling_diff_emits_insert_update_delete,
    truncate_preserves_definition,
};
pub use traits::{CrudAdapterTest, DataReadyAdapterTest, InsertOnlyAdapterTest};
