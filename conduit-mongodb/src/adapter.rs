//! `Adapter`/`Connection` for MongoDB (spec §4.1), grounded on
//! `conduit-neo4j::adapter`'s shape: `mongodb::Client` is already an
//! internally-pooled, cheaply-cloneable handle, so (like `neo4rs::Graph`)
//! one connection serves every operator wrapper without an actor thread or
//! a driver-side pool of our own.

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::{Client, Database};

pub struct MongoAdapter;

impl Adapter for MongoAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }
}

impl MongoAdapter {
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<MongoConnection> {
        let credential = if descriptor.username.is_empty() {
            None
        } else {
            Some(
                Credential::builder()
                    .username(descriptor.username.clone())
                    .password(password.to_string())
                    .build(),
            )
        };
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp { host: descriptor.host.clone(), port: Some(descriptor.port) }])
            .app_name("conduit".to_string())
            .credential(credential)
            .build();

        let client = Client::with_options(options).map_err(|e| wrap(e, "connect"))?;
        let database_name = descriptor.database.clone().unwrap_or_else(|| "admin".to_string());
        let database = client.database(&database_name);

        // `Client::with_options` never dials out by itself; a cheap command
        // confirms the server is actually reachable before this adapter
        // reports itself connected (spec §4.1 "Connect" must fail fast).
        database
            .run_command(bson::doc! { "ping": 1 }, None)
            .await
            .map_err(|e| wrap(e, "connect.ping"))?;

        let state = ConnectionState::new(BackendKind::MongoDb);
        state.mark_connected();
        Ok(MongoConnection { client, database, state })
    }
}

pub(crate) fn wrap(e: mongodb::error::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::MongoDb,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

#[derive(Clone)]
pub struct MongoConnection {
    pub(crate) client: Client,
    pub(crate) database: Database,
    pub(crate) state: ConnectionState,
}

impl MongoConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        self.database.run_command(bson::doc! { "ping": 1 }, None).await.map_err(|e| wrap(e, "ping")).map(|_| ())
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
