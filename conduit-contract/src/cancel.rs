//! Cancellation plumbing (spec §5: "every blocking operation accepts a
//! cancellation context; no blocking call ignores cancellation").
//!
//! The public operator surface takes a [`CancellationContext`] wrapping
//! `tokio_util::sync::CancellationToken`; the hot in-process stop signal
//! inside a replication worker uses a plain `Arc<AtomicBool>` instead,
//! matching `dozer-core::executor::source_node`'s `running: Arc<AtomicBool>`
//! field, because a worker's own tick loop checks it far more often than a
//! tokio cancellation token's `is_cancelled` would justify the indirection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Threaded through every operator method. Cheap to clone (wraps an `Arc`
/// internally); cancelling any clone cancels every other clone and the
/// children derived from it via [`CancellationContext::child`].
#[derive(Debug, Clone)]
pub struct CancellationContext {
    token: CancellationToken,
}

impl CancellationContext {
    pub fn new() -> Self {
        CancellationContext {
            token: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> Self {
        CancellationContext {
            token: self.token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl Default for CancellationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The stop signal inside a running [`crate::operators::ReplicationSourceHandle`].
/// A plain atomic, not a `CancellationContext`, because the worker loop
/// polls it every tick alongside a timer race rather than awaiting it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_signalled(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_context_is_cancelled_with_parent() {
        let parent = CancellationContext::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn stop_signal_starts_unsignalled() {
        let signal = StopSignal::new();
        assert!(!signal.is_signalled());
        signal.signal();
        assert!(signal.is_signalled());
    }
}
