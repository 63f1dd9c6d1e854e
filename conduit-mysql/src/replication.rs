//! Binlog `ChangeMechanism` for MySQL (spec §4.2 "logical log"). Opens a
//! `mysql_async::BinlogStream` against a dedicated connection reserved for
//! the lifetime of the stream and decodes row-based events via
//! `mysql_common`'s own binlog event types — unlike
//! `conduit-postgres::replication::pgoutput`, no hand-rolled wire decoder
//! is needed here because `mysql_common` already parses `TableMapEvent`/
//! `RowsEventData` into structured row images.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitResult, DetectedChange};
use conduit_replication::ChangeMechanism;
use conduit_types::{Field, FieldMap};
use futures::StreamExt;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn};
use mysql_common::binlog::events::{EventData, RowsEventData, TableMapEvent};
use mysql_common::binlog::value::BinlogValue;

use crate::adapter::wrap;

pub struct MySqlBinlogMechanism {
    entity: String,
    server_id: u32,
    conn: Option<Conn>,
    stream: Option<BinlogStream>,
    table_maps: HashMap<u64, TableMapEvent<'static>>,
    last_position: u64,
}

impl MySqlBinlogMechanism {
    pub fn new(entity: String, server_id: u32, conn: Conn) -> Self {
        MySqlBinlogMechanism {
            entity,
            server_id,
            conn: Some(conn),
            stream: None,
            table_maps: HashMap::new(),
            last_position: 0,
        }
    }

    async fn ensure_stream(&mut self) -> ConduitResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let conn = self.conn.take().expect("binlog connection taken twice");
        let request = BinlogStreamRequest::new(self.server_id);
        let stream = conn
            .get_binlog_stream(request)
            .await
            .map_err(|e| wrap(e, "replication.get_binlog_stream"))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn table_name(&self, table_id: u64) -> Option<String> {
        self.table_maps.get(&table_id).map(|t| t.table_name().into_owned())
    }

    fn row_to_field_map(table_map: &TableMapEvent<'_>, row: &[Option<BinlogValue<'_>>]) -> FieldMap {
        let mut map = FieldMap::new();
        for (idx, value) in row.iter().enumerate() {
            let name = table_map
                .column_name(idx)
                .map(|c| c.into_owned())
                .unwrap_or_else(|| format!("column_{idx}"));
            let field = match value {
                None => Field::Null,
                Some(BinlogValue::Value(v)) => crate::convert_value(v),
                Some(BinlogValue::Jsonb(j)) => Field::Json(serde_json::to_value(j).unwrap_or(serde_json::Value::Null)),
            };
            map.insert(name, field);
        }
        map
    }
}

#[async_trait]
impl ChangeMechanism for MySqlBinlogMechanism {
    fn entity(&self) -> &str {
        &self.entity
    }

    async fn probe(&mut self, cx: &CancellationContext) -> ConduitResult<Vec<DetectedChange>> {
        self.ensure_stream().await?;
        let stream = self.stream.as_mut().expect("just ensured above");

        let mut events = Vec::new();
        loop {
            let next = tokio::select! {
                item = stream.next() => item,
                _ = cx.cancelled() => return Ok(events),
                _ = tokio::time::sleep(Duration::from_millis(1)) => break,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(wrap(e, "replication.binlog_stream")),
                None => break,
            };
            self.last_position += 1;
            let data = match event.read_data() {
                Ok(Some(data)) => data,
                _ => continue,
            };
            match data {
                EventData::TableMapEvent(table_map) => {
                    self.table_maps.insert(table_map.table_id(), table_map.into_owned());
                }
                EventData::RowsEvent(rows_event) => {
                    self.decode_rows_event(rows_event, &mut events);
                }
                _ => {}
            }
        }
        Ok(events)
    }

    fn position(&self) -> Option<String> {
        if self.last_position == 0 {
            None
        } else {
            Some(format!("{:020}", self.last_position))
        }
    }

    async fn release(&mut self) -> ConduitResult<()> {
        self.stream = None;
        Ok(())
    }
}

impl MySqlBinlogMechanism {
    fn decode_rows_event(&self, rows_event: RowsEventData<'_>, events: &mut Vec<DetectedChange>) {
        let table_id = rows_event.table_id();
        let table_map = match self.table_maps.get(&table_id) {
            Some(t) => t,
            None => return,
        };
        let table_name = match self.table_name(table_id) {
            Some(n) => n,
            None => return,
        };

        match rows_event {
            RowsEventData::WriteRowsEvent(write) => {
                for row in write.rows(table_map).filter_map(|r| r.ok()) {
                    if let Some(after) = row.1 {
                        let data = Self::row_to_field_map(table_map, &after);
                        events.push(self.raw_event("INSERT", &table_name, Some(data), None));
                    }
                }
            }
            RowsEventData::UpdateRowsEvent(update) => {
                for row in update.rows(table_map).filter_map(|r| r.ok()) {
                    let old = row.0.map(|before| Self::row_to_field_map(table_map, &before));
                    let data = row.1.map(|after| Self::row_to_field_map(table_map, &after));
                    events.push(self.raw_event("UPDATE", &table_name, data, old));
                }
            }
            RowsEventData::DeleteRowsEvent(delete) => {
                for row in delete.rows(table_map).filter_map(|r| r.ok()) {
                    if let Some(before) = row.0 {
                        let old = Self::row_to_field_map(table_map, &before);
                        events.push(self.raw_event("DELETE", &table_name, None, Some(old)));
                    }
                }
            }
            _ => {}
        }
    }

    fn raw_event(
        &self,
        operation: &str,
        table_name: &str,
        data: Option<FieldMap>,
        old_data: Option<FieldMap>,
    ) -> DetectedChange {
        let mut event = serde_json::Map::new();
        event.insert("operation".into(), operation.into());
        event.insert("table_name".into(), table_name.into());
        if let Some(data) = data {
            event.insert("data".into(), crate::field_map_to_json(&data));
        }
        if let Some(old_data) = old_data {
            event.insert("old_data".into(), crate::field_map_to_json(&old_data));
        }
        event.insert("lsn".into(), format!("{:020}", self.last_position).into());
        event
    }
}
