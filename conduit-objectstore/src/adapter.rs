//! `Adapter`/`Connection` for the object-store backend (spec §4.1),
//! grounded on `dozer-ingestion/object-store`'s `LocalStorage`/S3
//! connectors: the one native driver dependency here is
//! `object_store::ObjectStore`, an already-cheaply-cloneable
//! `Arc`-wrapped handle, so — like `neo4rs::Graph` and `mongodb::Client`
//! elsewhere in this workspace — one instance serves every operator
//! wrapper directly.
//!
//! Unlike every other backend adapter, `ConnectionDescriptor.host`/`port`
//! name nothing here: object stores are addressed by bucket + root prefix,
//! carried in `options` the same way `conduit-snowflake` carries
//! `warehouse`/`schema` there.

use std::sync::Arc;

use conduit_contract::{Adapter, ConduitError, ConduitResult, ConnectionDescriptor, ConnectionState};
use conduit_types::BackendKind;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore as ObjectStoreTrait;

pub struct ObjectStoreAdapter;

impl Adapter for ObjectStoreAdapter {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }
}

impl ObjectStoreAdapter {
    /// Builds either a local-filesystem store (when `options.kind ==
    /// "local"` or is absent) or an S3-backed store, mirroring the
    /// teacher's `LocalStorage`/`S3Storage` split (spec §4.7 "enriched
    /// from outside the teacher" is not needed here — the teacher's own
    /// two storage kinds cover it).
    pub async fn connect(&self, descriptor: &ConnectionDescriptor, password: &str) -> ConduitResult<ObjectStoreConnection> {
        let kind = descriptor.options.get("kind").map(String::as_str).unwrap_or("local");
        let root = descriptor.options.get("root").cloned().unwrap_or_else(|| "/tmp/conduit-objectstore".to_string());

        let store: Arc<dyn ObjectStoreTrait> = match kind {
            "s3" => {
                let bucket = descriptor
                    .options
                    .get("bucket")
                    .ok_or_else(|| ConduitError::ConfigurationError {
                        backend: BackendKind::ObjectStore,
                        operation: "connect",
                        context: conduit_contract::context([("missing_option", "bucket".to_string())]),
                    })?;
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_access_key_id(&descriptor.username)
                    .with_secret_access_key(password);
                if let Some(region) = descriptor.options.get("region") {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = descriptor.options.get("endpoint") {
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }
                let s3 = builder.build().map_err(|e| wrap(e, "connect"))?;
                Arc::new(s3)
            }
            _ => {
                std::fs::create_dir_all(&root).map_err(|e| ConduitError::ConnectionFailure {
                    backend: BackendKind::ObjectStore,
                    operation: "connect.create_root",
                    context: Default::default(),
                    source: Some(Box::new(e)),
                })?;
                let local = LocalFileSystem::new_with_prefix(&root).map_err(|e| wrap(e, "connect"))?;
                Arc::new(local)
            }
        };

        let state = ConnectionState::new(BackendKind::ObjectStore);
        state.mark_connected();
        Ok(ObjectStoreConnection { store, root, state })
    }
}

pub(crate) fn wrap(e: object_store::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::ObjectStore,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

#[derive(Clone)]
pub struct ObjectStoreConnection {
    pub(crate) store: Arc<dyn ObjectStoreTrait>,
    /// Local-filesystem root, or (for S3) the configured prefix under the
    /// bucket. Tables are first-level path segments under this root, the
    /// same layout the teacher's `LocalStorage` test fixtures use (one
    /// directory per table, `*.parquet` files inside).
    pub(crate) root: String,
    pub(crate) state: ConnectionState,
}

impl ObjectStoreConnection {
    pub async fn ping(&self) -> ConduitResult<()> {
        use futures::StreamExt;
        let mut stream = self.store.list(None);
        // A store with zero objects is still reachable; only a transport
        // error on the first poll counts as a failed ping.
        match stream.next().await {
            Some(Err(e)) => Err(wrap(e, "ping")),
            _ => Ok(()),
        }
    }

    pub fn close(&self) {
        self.state.mark_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn store(&self) -> Arc<dyn ObjectStoreTrait> {
        self.store.clone()
    }
}
