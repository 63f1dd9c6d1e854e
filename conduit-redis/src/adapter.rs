//! `Adapter`/`Connection` for Redis (spec §4.1), grounded on
//! `conduit-postgres::adapter`'s shape, adapted to `redis`'s
//! `aio::MultiplexedConnection` (already safe to clone and share across
//! operator wrapper structs, like `neo4rs::Graph`).

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use redis::aio::MultiplexedConnection;
use redis::Client;

pub struct RedisAdapter;

impl Adapter for RedisAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Redis
    }
}

impl RedisAdapter {
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<RedisConnection> {
        let scheme = if descriptor.tls.enabled { "rediss" } else { "redis" };
        let auth = if descriptor.username.is_empty() && password.is_empty() {
            String::new()
        } else {
            format!("{}:{}@", descriptor.username, password)
        };
        let db = descriptor.database.as_deref().unwrap_or("0");
        let url = format!("{scheme}://{auth}{}:{}/{db}", descriptor.host, descriptor.port);

        let client = Client::open(url).map_err(|e| wrap(e, "connect"))?;
        let connection = client.get_multiplexed_tokio_connection().await.map_err(|e| wrap(e, "connect"))?;

        let state = ConnectionState::new(BackendKind::Redis);
        state.mark_connected();
        Ok(RedisConnection { connection, state })
    }
}

pub(crate) fn wrap(e: redis::RedisError, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::Redis,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

#[derive(Clone)]
pub struct RedisConnection {
    pub(crate) connection: MultiplexedConnection,
    pub(crate) state: ConnectionState,
}

impl RedisConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.map(|_| ()).map_err(|e| wrap(e, "ping"))
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}
