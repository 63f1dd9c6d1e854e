//! `ConnectionDescriptor`/`Connection` (spec §3): the opaque-to-the-core
//! handle lifecycle every `Adapter::connect` produces.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use conduit_types::BackendKind;
use uuid::Uuid;

/// Opaque except for the fields the core itself needs to route a
/// connection (spec §3). Consumed once by `Adapter::connect`; never
/// mutated by the core afterwards — callers build a fresh descriptor to
/// reconnect rather than mutating one in place.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Pre-encrypted; decrypted only by the injected `DecryptPassword`
    /// capability at the point of use (spec §6), never logged or stored in
    /// plaintext here.
    pub encrypted_password: String,
    pub database: Option<String>,
    pub tls: TlsOptions,
    pub role: Option<String>,
    pub tenant_scope: Option<String>,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub enabled: bool,
    pub verify_server_cert: bool,
    pub ca_cert_path: Option<String>,
}

/// A secret-opener capability injected by the caller (spec §6
/// `DecryptPassword(tenant, ciphertext) -> plaintext`). Not implemented in
/// this workspace — consumed as a trait object only.
pub trait SecretOpener: Send + Sync {
    fn decrypt_password(&self, tenant: &str, ciphertext: &str) -> Result<String, String>;
}

/// A handle over a live session or driver instance. `is_connected` is the
/// monotonic atomic flag from spec §3: `0 -> 1` at successful connect,
/// `1 -> 0` exactly once at `close`. A `Connection` owns its driver
/// exclusively; dropping/closing it drops the driver.
#[derive(Clone)]
pub struct ConnectionState {
    pub id: Uuid,
    pub backend: BackendKind,
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    pub fn new(backend: BackendKind) -> Self {
        ConnectionState {
            id: Uuid::new_v4(),
            backend,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Called by the adapter exactly once, after the driver handshake
    /// succeeds. Calling it again is a no-op (the flag only has two legal
    /// transitions).
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Transitions `1 -> 0` exactly once; subsequent calls are no-ops.
    /// Returns whether this call performed the transition, so `Close` can
    /// decide whether it still owes the driver a teardown call.
    pub fn mark_closed(&self) -> bool {
        self.connected
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// A weak handle a `ReplicationSource` can hold without extending the
    /// connection's ownership of the driver (spec §3: "the source holds a
    /// weak reference — lifetime of driver = lifetime of Connection").
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::new(BackendKind::Postgres);
        assert!(!state.is_connected());
    }

    #[test]
    fn mark_connected_then_closed_transitions_once_each() {
        let state = ConnectionState::new(BackendKind::Postgres);
        state.mark_connected();
        assert!(state.is_connected());
        assert!(state.mark_closed());
        assert!(!state.is_connected());
        // Second close is a no-op, not an error.
        assert!(!state.mark_closed());
    }

    #[test]
    fn ping_failure_does_not_demote_connected_flag() {
        // A `Ping` failure is a transient probe result, per spec §7: it
        // only demotes `is_connected` if the caller explicitly calls
        // `mark_closed` (i.e. reconnects). Simulating a probe failure here
        // is simply *not* calling `mark_closed`.
        let state = ConnectionState::new(BackendKind::Postgres);
        state.mark_connected();
        // ... a hypothetical failed ping happens here, no state mutation ...
        assert!(state.is_connected());
    }
}
