//! `Adapter`/`Connection` for MySQL (spec §4.1), grounded on
//! `conduit-postgres::adapter`'s shape, adapted to `mysql_async`'s
//! pool-per-connection model rather than a single shared driver client.

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Pool};

pub struct MySqlAdapter;

impl Adapter for MySqlAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::MySql
    }
}

impl MySqlAdapter {
    /// `Adapter::Connect(descriptor) -> Connection` (spec §4.1). Builds a
    /// `mysql_async::Pool` from the opaque descriptor fields; the pool
    /// itself is the "driver handle" this workspace shares per spec §5
    /// "Shared resources", since `mysql_async::Conn` (unlike
    /// `tokio_postgres::Client`) cannot pipeline concurrent queries over
    /// one socket.
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<MySqlConnection> {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(descriptor.host.clone())
            .tcp_port(descriptor.port)
            .user(Some(descriptor.username.clone()))
            .pass(Some(password.to_string()));
        if let Some(db) = &descriptor.database {
            builder = builder.db_name(Some(db.clone()));
        }
        let opts: Opts = builder.into();
        let pool = Pool::new(opts);

        let state = ConnectionState::new(BackendKind::MySql);
        // Probe the pool once so a bad host/credential fails `connect`
        // rather than surfacing on the first real query.
        let mut conn = pool.get_conn().await.map_err(|e| wrap(e, "connect"))?;
        let _: Option<u8> = conn.query_first("SELECT 1").await.map_err(|e| wrap(e, "connect"))?;
        drop(conn);

        state.mark_connected();
        Ok(MySqlConnection { pool, state })
    }
}

pub(crate) fn wrap(e: mysql_async::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::MySql,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

/// A live session over a `mysql_async::Pool` (spec §3 `Connection`).
#[derive(Clone)]
pub struct MySqlConnection {
    pub(crate) pool: Pool,
    pub(crate) state: ConnectionState,
}

impl MySqlConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| wrap(e, "ping"))?;
        let _: Option<u8> = conn.query_first("SELECT 1").await.map_err(|e| wrap(e, "ping"))?;
        Ok(())
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub async fn conn(&self) -> ConduitResult<mysql_async::Conn> {
        self.pool.get_conn().await.map_err(|e| wrap(e, "acquire_connection"))
    }
}
