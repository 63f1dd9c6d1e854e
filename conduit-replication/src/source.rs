use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use conduit_contract::{
    parse_event, CancellationContext, CDCEvent, ConduitError, ConduitResult, ReplicationConfig,
    StopSignal,
};
use conduit_types::BackendKind;
use tokio::task::JoinHandle;

use crate::mechanism::ChangeMechanism;

/// `func(event) -> error` (spec §6): invoked serially per source, once per
/// normalized [`CDCEvent`]. A `nil`/`Ok(())` return acknowledges; an error
/// is logged and does not abort the worker loop.
pub type EventHandler = Arc<dyn Fn(CDCEvent) -> ConduitResult<()> + Send + Sync>;

/// `SetCheckpointFunc` (spec §6): an external, injected
/// `SaveCheckpoint(ctx, position)` the core calls but never implements.
pub type CheckpointFn = Arc<dyn Fn(&str) + Send + Sync>;

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;
const STOPPED: u8 = 2;
const CLOSED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle,
    Active,
    Stopped,
    Closed,
}

fn decode(state: u8) -> SourceState {
    match state {
        IDLE => SourceState::Idle,
        ACTIVE => SourceState::Active,
        STOPPED => SourceState::Stopped,
        _ => SourceState::Closed,
    }
}

/// The generic replication runtime (spec §3/§4.2): `Idle -> Active ->
/// Stopped`, `Close` reachable from any state. Guarded by one atomic CAS;
/// illegal transitions return `IllegalState` without side effects.
///
/// Generic over `M: ChangeMechanism` so the CAS state machine, worker
/// spawn/join, stop signal, and position mutex are written once and reused
/// by every backend crate (see module docs).
pub struct ReplicationSource<M: ChangeMechanism> {
    id: String,
    backend: BackendKind,
    config: ReplicationConfig,
    state: Arc<AtomicU8>,
    stop_signal: StopSignal,
    position: Arc<Mutex<Option<String>>>,
    handler: EventHandler,
    checkpoint_fn: Option<CheckpointFn>,
    workers: Vec<JoinHandle<M>>,
    mechanisms: Vec<M>,
}

impl<M: ChangeMechanism> ReplicationSource<M> {
    pub fn new(
        backend: BackendKind,
        config: ReplicationConfig,
        mechanisms: Vec<M>,
        handler: EventHandler,
        checkpoint_fn: Option<CheckpointFn>,
    ) -> Self {
        let id = config.id.clone();
        ReplicationSource {
            id,
            backend,
            config,
            state: Arc::new(AtomicU8::new(IDLE)),
            stop_signal: StopSignal::new(),
            position: Arc::new(Mutex::new(None)),
            handler,
            checkpoint_fn,
            workers: Vec::new(),
            mechanisms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SourceState {
        decode(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SourceState::Active
    }

    pub fn get_position(&self) -> Option<String> {
        self.position.lock().expect("position mutex poisoned").clone()
    }

    /// Advances the position only if `new` orders strictly after the
    /// current value (spec §4.2 worker step 4). Tokens are backend-opaque,
    /// so "orders after" falls back to lexicographic string comparison,
    /// which holds for the zero-padded/monotonic-numeric token formats
    /// every adapter in this workspace produces (LSNs, binlog
    /// file:position pairs formatted with fixed width, stream offsets).
    pub fn set_position(&self, new: String) {
        let mut guard = self.position.lock().expect("position mutex poisoned");
        let advances = match guard.as_ref() {
            Some(current) => new.as_str() > current.as_str(),
            None => !new.is_empty(),
        };
        if advances {
            *guard = Some(new);
        }
    }

    /// Persists the current position via the injected checkpoint function,
    /// if one is registered (spec §6 `SetCheckpointFunc`). A no-op
    /// otherwise — this is the "at-most-replay-from-now" fallback the
    /// spec's §9 Open Question describes for backends with no durable
    /// position of their own.
    pub fn save_checkpoint(&self) {
        if let (Some(checkpoint_fn), Some(position)) = (&self.checkpoint_fn, self.get_position()) {
            checkpoint_fn(&position);
        }
    }

    /// CAS `Idle -> Active`; launches exactly one supervisor task per
    /// tracked entity (spec §4.2). Illegal when not `Idle`.
    pub fn start(&mut self) -> ConduitResult<()> {
        self.state
            .compare_exchange(IDLE, ACTIVE, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ConduitError::illegal_state(self.backend, "replication.start", "not idle"))?;

        for mechanism in self.mechanisms.drain(..) {
            let state = self.state.clone();
            let stop_signal = self.stop_signal.clone();
            let position = self.position.clone();
            let handler = self.handler.clone();
            let backend = self.backend;
            let poll_interval = self.config.poll_interval;
            let cx = CancellationContext::new();

            let handle = tokio::spawn(async move {
                run_worker(backend, mechanism, state, stop_signal, position, handler, poll_interval, cx).await
            });
            self.workers.push(handle);
        }
        Ok(())
    }

    /// CAS `Active -> Stopped`; signals every worker and waits for them to
    /// drain. After this returns, no further callback invocations occur
    /// (spec §8 testable property). Each worker hands its mechanism back on
    /// join so `close` can still release it — `start` moved it out of
    /// `self.mechanisms` into the spawned task, so this is the only place
    /// it comes back.
    pub async fn stop(&mut self) -> ConduitResult<()> {
        self.state
            .compare_exchange(ACTIVE, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ConduitError::illegal_state(self.backend, "replication.stop", "not active"))?;
        self.stop_signal.signal();
        for handle in self.workers.drain(..) {
            if let Ok(mechanism) = handle.await {
                self.mechanisms.push(mechanism);
            }
        }
        Ok(())
    }

    /// Idempotent from any state: releases backend-side artifacts via
    /// every mechanism's [`ChangeMechanism::release`] and marks `Closed`.
    /// If the source was still `Active`, stops it first so its mechanisms
    /// have rejoined `self.mechanisms` before the release loop below runs.
    pub async fn close(&mut self) -> ConduitResult<()> {
        if self.state() == SourceState::Active {
            self.stop().await?;
        }
        let previous = self.state.swap(CLOSED, Ordering::SeqCst);
        if previous == CLOSED {
            return Ok(());
        }
        for mechanism in self.mechanisms.iter_mut() {
            let _ = mechanism.release().await;
        }
        Ok(())
    }
}

/// Runs the probe loop until stopped, then hands `mechanism` back to the
/// caller via the `JoinHandle`'s return value so `stop`/`close` can recover
/// it into `self.mechanisms` and call `release` on it — `start` moved it
/// out of that `Vec` when it spawned this task.
async fn run_worker<M: ChangeMechanism>(
    backend: BackendKind,
    mut mechanism: M,
    state: Arc<AtomicU8>,
    stop_signal: StopSignal,
    position: Arc<Mutex<Option<String>>>,
    handler: EventHandler,
    poll_interval: std::time::Duration,
    cx: CancellationContext,
) -> M {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cx.cancelled() => break,
        }
        if stop_signal.is_signalled() || decode(state.load(Ordering::SeqCst)) != SourceState::Active {
            break;
        }

        let changes = match mechanism.probe(&cx).await {
            Ok(changes) => changes,
            Err(e) => {
                log::warn!(
                    "replication worker for {} on {backend}: probe failed: {e}",
                    mechanism.entity()
                );
                continue;
            }
        };

        for raw in changes {
            match parse_event(backend, &raw) {
                Ok(event) => {
                    let lsn = event.lsn.clone();
                    if let Err(e) = handler(event) {
                        log::warn!("replication worker for {} on {backend}: handler error: {e}", mechanism.entity());
                    }
                    if !lsn.is_empty() {
                        let mut guard = position.lock().expect("position mutex poisoned");
                        let advances = guard.as_ref().map_or(true, |current| lsn.as_str() > current.as_str());
                        if advances {
                            *guard = Some(lsn);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("replication worker for {} on {backend}: parse failed: {e}", mechanism.entity());
                }
            }
        }

        if let Some(mechanism_position) = mechanism.position() {
            let mut guard = position.lock().expect("position mutex poisoned");
            let advances = guard.as_ref().map_or(true, |current| mechanism_position.as_str() > current.as_str());
            if advances {
                *guard = Some(mechanism_position);
            }
        }
    }
    mechanism
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_contract::DetectedChange;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    struct CountingMechanism {
        entity: String,
        events: Arc<AsyncMutex<Vec<DetectedChange>>>,
    }

    #[async_trait]
    impl ChangeMechanism for CountingMechanism {
        fn entity(&self) -> &str {
            &self.entity
        }

        async fn probe(&mut self, _cx: &CancellationContext) -> ConduitResult<Vec<DetectedChange>> {
            let mut guard = self.events.lock().await;
            Ok(std::mem::take(&mut guard))
        }
    }

    fn make_source(
        events: Arc<AsyncMutex<Vec<DetectedChange>>>,
        callback_count: Arc<AtomicUsize>,
    ) -> ReplicationSource<CountingMechanism> {
        let mechanism = CountingMechanism {
            entity: "widgets".to_string(),
            events,
        };
        let handler: EventHandler = Arc::new(move |_event| {
            callback_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let config = ReplicationConfig {
            poll_interval: std::time::Duration::from_millis(5),
            ..Default::default()
        };
        ReplicationSource::new(BackendKind::Postgres, config, vec![mechanism], handler, None)
    }

    #[tokio::test]
    async fn start_when_idle_succeeds_and_is_active() {
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let mut source = make_source(events, count);
        assert_eq!(source.state(), SourceState::Idle);
        source.start().unwrap();
        assert!(source.is_active());
    }

    #[tokio::test]
    async fn start_when_already_active_is_illegal() {
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let mut source = make_source(events, count);
        source.start().unwrap();
        let err = source.start().unwrap_err();
        assert!(matches!(err, ConduitError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn stop_when_not_active_is_illegal() {
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let mut source = make_source(events, count);
        let err = source.stop().await.unwrap_err();
        assert!(matches!(err, ConduitError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn stop_drains_workers_and_no_further_callbacks_fire() {
        let events = Arc::new(AsyncMutex::new(vec![serde_json::json!({
            "operation": "INSERT", "table_name": "widgets", "data": {"id": 1}
        })
        .as_object()
        .unwrap()
        .clone()]));
        let count = Arc::new(AtomicUsize::new(0));
        let mut source = make_source(events.clone(), count.clone());
        source.start().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        source.stop().await.unwrap();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 1);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop, "no callback after stop");
        assert!(!source.is_active());
    }

    #[test]
    fn set_position_only_advances_strictly_after() {
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let source = make_source(events, count);
        source.set_position("0005".to_string());
        assert_eq!(source.get_position(), Some("0005".to_string()));
        source.set_position("0003".to_string());
        assert_eq!(source.get_position(), Some("0005".to_string()));
        source.set_position("0010".to_string());
        assert_eq!(source.get_position(), Some("0010".to_string()));
    }

    #[tokio::test]
    async fn close_from_idle_is_idempotent() {
        let events = Arc::new(AsyncMutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let mut source = make_source(events, count);
        source.close().await.unwrap();
        assert_eq!(source.state(), SourceState::Closed);
        source.close().await.unwrap();
        assert_eq!(source.state(), SourceState::Closed);
    }
}
