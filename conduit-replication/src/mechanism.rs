//! The per-backend change-detection strategy (spec §4.2). Every mechanism
//! — logical log, native stream/change feed, or last-resort polling —
//! implements the same narrow surface: probe once, bounded by a timeout,
//! and return whatever raw events it found plus (optionally) an updated
//! position token.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DetectedChange};

/// One change-detection probe (spec §4.2 step 2: "Execute one
/// change-detection probe bounded by a per-probe query timeout"). The
/// timeout itself is the mechanism's responsibility (it knows whether it's
/// a blocking log read or a bounded poll query); the worker harness in
/// [`crate::source`] only calls `probe` once per tick and does not itself
/// impose a timeout, so a mechanism that wants one wraps its own body in
/// `tokio::time::timeout`.
#[async_trait]
pub trait ChangeMechanism: Send + Sync + 'static {
    /// The entity this mechanism watches (a table name, a graph label, a
    /// topic, a key pattern) — used only for logging.
    fn entity(&self) -> &str;

    /// Runs one probe and returns any raw events detected. An empty `Vec`
    /// is the common case (nothing changed this tick).
    async fn probe(&mut self, cx: &CancellationContext) -> ConduitResult<Vec<DetectedChange>>;

    /// The mechanism's own position token after the most recent probe, if
    /// it tracks one more precisely than "the last event's LSN" (used by
    /// log-based mechanisms where `GetPosition` should reflect the latest
    /// confirmed flush LSN even on a tick with zero events).
    fn position(&self) -> Option<String> {
        None
    }

    /// Releases any backend-side artifact this mechanism created (a
    /// temporary change stream, a replication slot), called from `Close`
    /// (spec §4.2).
    async fn release(&mut self) -> ConduitResult<()> {
        Ok(())
    }
}
