//! `Adapter`/`Connection` for Postgres (spec §4.1), grounded on
//! `dozer-ingestion/postgres/src/connection` (host/port/dbname connection
//! string assembly, `tokio_postgres::connect` + rustls TLS negotiation).

use std::sync::Arc;

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use tokio_postgres::Client;

use crate::quoting::POSTGRES_QUOTER;

pub struct PostgresAdapter;

impl Adapter for PostgresAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Postgres
    }
}

impl PostgresAdapter {
    /// `Adapter::Connect(descriptor) -> Connection` (spec §4.1). Builds a
    /// libpq-style connection string from the opaque descriptor fields and
    /// negotiates TLS the way `dozer-ingestion-postgres`'s
    /// `connection::helper` does when `descriptor.tls.enabled`.
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<PostgresConnection> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.port)
            .user(&descriptor.username)
            .password(password);
        if let Some(db) = &descriptor.database {
            config.dbname(db);
        }

        let state = ConnectionState::new(BackendKind::Postgres);

        let client = if descriptor.tls.enabled {
            connect_tls(&config, &descriptor.tls).await?
        } else {
            let (client, connection) = config.connect(tokio_postgres::NoTls).await.map_err(|e| {
                ConduitError::ConnectionFailure {
                    backend: BackendKind::Postgres,
                    operation: "connect",
                    context: conduit_contract::context([("host", descriptor.host.clone())]),
                    source: Some(Box::new(e)),
                }
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    log::warn!("postgres connection task ended: {e}");
                }
            });
            client
        };

        state.mark_connected();
        Ok(PostgresConnection {
            client: Arc::new(client),
            state,
        })
    }

    /// A second connection opened in replication mode (spec §4.2): Postgres
    /// multiplexes regular queries and `START_REPLICATION` over distinct
    /// connection states, so the logical-replication mechanism needs its
    /// own `Client` rather than sharing [`PostgresConnection::client`].
    pub async fn connect_replication(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<Client> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.port)
            .user(&descriptor.username)
            .password(password)
            .replication_mode(tokio_postgres::config::ReplicationMode::Logical);
        if let Some(db) = &descriptor.database {
            config.dbname(db);
        }

        if descriptor.tls.enabled {
            connect_tls(&config, &descriptor.tls).await
        } else {
            let (client, connection) = config.connect(tokio_postgres::NoTls).await.map_err(|e| {
                ConduitError::ConnectionFailure {
                    backend: BackendKind::Postgres,
                    operation: "connect_replication",
                    context: conduit_contract::context([("host", descriptor.host.clone())]),
                    source: Some(Box::new(e)),
                }
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    log::warn!("postgres replication connection task ended: {e}");
                }
            });
            Ok(client)
        }
    }
}

async fn connect_tls(
    config: &tokio_postgres::Config,
    tls: &conduit_contract::TlsOptions,
) -> ConduitResult<Client> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().map_err(|e| ConduitError::ConnectionFailure {
        backend: BackendKind::Postgres,
        operation: "connect.tls_roots",
        context: Default::default(),
        source: Some(Box::new(e)),
    })? {
        let _ = roots.add(&rustls::Certificate(cert.0));
    }
    let mut tls_config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    if !tls.verify_server_cert {
        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerification));
    }
    let tls_connector = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = config.connect(tls_connector).await.map_err(|e| ConduitError::ConnectionFailure {
        backend: BackendKind::Postgres,
        operation: "connect.tls",
        context: Default::default(),
        source: Some(Box::new(e)),
    })?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::warn!("postgres TLS connection task ended: {e}");
        }
    });
    Ok(client)
}

/// Only installed when the descriptor explicitly opts out of server-cert
/// verification (spec §3 `TlsOptions.verify_server_cert`); never the
/// default.
struct NoCertVerification;

impl rustls::client::ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

/// A live session over a `tokio_postgres::Client` (spec §3 `Connection`).
/// Cheap to clone the inner `Arc` for the schema/data/metadata operator
/// wrapper structs, which all share the one driver instance per spec §5
/// "Shared resources".
#[derive(Clone)]
pub struct PostgresConnection {
    pub(crate) client: Arc<Client>,
    pub(crate) state: ConnectionState,
}

impl PostgresConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| ConduitError::ConnectionFailure {
                backend: BackendKind::Postgres,
                operation: "ping",
                context: Default::default(),
                source: Some(Box::new(e)),
            })
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn quoter() -> &'static conduit_contract::FixedQuoter {
        &POSTGRES_QUOTER
    }
}
