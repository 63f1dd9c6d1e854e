//! `Adapter`/`Connection` for Neo4j (spec §4.1), grounded on
//! `conduit-postgres::adapter`'s shape, adapted to `neo4rs::Graph`'s
//! internally-pooled connection model (one handle is already safe to
//! share across every operator wrapper, unlike `mysql_async`).

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use neo4rs::{ConfigBuilder, Graph};

pub struct Neo4jAdapter;

impl Adapter for Neo4jAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Neo4j
    }
}

impl Neo4jAdapter {
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<Neo4jConnection> {
        let uri = format!("{}:{}", descriptor.host, descriptor.port);
        let mut builder = ConfigBuilder::default().uri(&uri).user(&descriptor.username).password(password);
        if let Some(db) = &descriptor.database {
            builder = builder.db(db.clone());
        }
        let config = builder.build().map_err(|e| wrap(e, "connect"))?;
        let graph = Graph::connect(config).await.map_err(|e| wrap(e, "connect"))?;

        let state = ConnectionState::new(BackendKind::Neo4j);
        state.mark_connected();
        Ok(Neo4jConnection { graph, state })
    }
}

pub(crate) fn wrap(e: neo4rs::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::Neo4j,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

#[derive(Clone)]
pub struct Neo4jConnection {
    pub(crate) graph: Graph,
    pub(crate) state: ConnectionState,
}

impl Neo4jConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        self.graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| wrap(e, "ping"))
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}
