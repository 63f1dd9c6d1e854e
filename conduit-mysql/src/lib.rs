//! MySQL backend adapter (spec §4.1/§4.2): schema discovery and DDL,
//! row-level data access, instance metadata, and a binlog-based CDC source
//! with a matching sink applier.

pub mod adapter;
pub mod applier;
pub mod convert;
pub mod data;
pub mod metadata;
pub mod quoting;
pub mod replication;
pub mod schema;

use async_trait::async_trait;
use conduit_contract::{
    CancellationContext, ConduitResult, ConnectionDescriptor, ReplicationConfig, ReplicationOperator,
};
use conduit_replication::source::CheckpointFn;
use conduit_replication::{EventHandler, ReplicationSource};
use conduit_types::{BackendKind, Field, FieldMap};
use mysql_common::value::Value;

pub use adapter::{MySqlAdapter, MySqlConnection};
pub use applier::MySqlCdcApplier;
pub use data::MySqlDataOperator;
pub use metadata::MySqlMetadataOperator;
pub use quoting::MYSQL_QUOTER;
pub use replication::MySqlBinlogMechanism;
pub use schema::MySqlSchemaOperator;

pub(crate) fn convert_value(value: &Value) -> Field {
    match value {
        Value::NULL => Field::Null,
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Field::String(s.to_string()),
            Err(_) => Field::Binary(bytes.clone()),
        },
        Value::Int(i) => Field::Int(*i),
        Value::UInt(u) => Field::UInt(*u),
        Value::Float(f) => Field::Float(*f as f64),
        Value::Double(d) => Field::Float(*d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let naive = chrono::NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32)
                .and_then(|d| d.and_hms_micro_opt(*hour as u32, *minute as u32, *second as u32, *micros))
                .unwrap_or_default();
            Field::Timestamp(chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            Field::String(format!(
                "{sign}{}:{hours:02}:{minutes:02}:{seconds:02}.{micros:06}",
                *days as i64 * 24
            ))
        }
    }
}

pub(crate) fn field_map_to_json(map: &FieldMap) -> serde_json::Value {
    let mut json = serde_json::Map::new();
    for (k, v) in map {
        json.insert(k.clone(), field_to_json(v));
    }
    serde_json::Value::Object(json)
}

fn field_to_json(field: &Field) -> serde_json::Value {
    match field {
        Field::Boolean(b) => serde_json::Value::Bool(*b),
        Field::Int(i) => serde_json::json!(i),
        Field::UInt(u) => serde_json::json!(u),
        Field::Float(f) => serde_json::json!(f),
        Field::String(s) => serde_json::Value::String(s.clone()),
        Field::Binary(b) => serde_json::Value::String(hex_encode(b)),
        Field::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        Field::Json(v) => v.clone(),
        Field::Null => serde_json::Value::Null,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// `ReplicationOperator` for MySQL (spec §4.2): each tracked table gets its
/// own [`MySqlBinlogMechanism`] sharing one binlog connection reserved for
/// the lifetime of the stream (a server only allows one binlog dump per
/// replica connection, unlike Postgres's per-slot model), fed into the
/// shared [`conduit_replication::ReplicationSource`] lifecycle.
pub struct MySqlReplicationOperator {
    adapter: MySqlAdapter,
    descriptor: ConnectionDescriptor,
    password: String,
    server_id: u32,
    handler: EventHandler,
    checkpoint_fn: Option<CheckpointFn>,
}

impl MySqlReplicationOperator {
    pub fn new(
        descriptor: ConnectionDescriptor,
        password: String,
        server_id: u32,
        handler: EventHandler,
        checkpoint_fn: Option<CheckpointFn>,
    ) -> Self {
        MySqlReplicationOperator {
            adapter: MySqlAdapter,
            descriptor,
            password,
            server_id,
            handler,
            checkpoint_fn,
        }
    }
}

#[async_trait]
impl ReplicationOperator for MySqlReplicationOperator {
    type Source = ReplicationSource<MySqlBinlogMechanism>;

    async fn connect(&self, _cx: &CancellationContext, config: ReplicationConfig) -> ConduitResult<Self::Source> {
        let connection = self.adapter.connect(&self.descriptor, &self.password).await?;

        let mut mechanisms = Vec::with_capacity(config.tracked_entities.len());
        for (offset, entity) in config.tracked_entities.iter().enumerate() {
            let conn = connection.conn().await?;
            // Each watched table's binlog worker needs a distinct server id
            // to register as a distinct replica with the primary.
            mechanisms.push(MySqlBinlogMechanism::new(
                entity.clone(),
                self.server_id.wrapping_add(offset as u32),
                conn,
            ));
        }

        Ok(ReplicationSource::new(
            BackendKind::MySql,
            config,
            mechanisms,
            self.handler.clone(),
            self.checkpoint_fn.clone(),
        ))
    }
}
