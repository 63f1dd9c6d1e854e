//! `DataOperator` for MySQL (spec §4.1). Every identifier routes through
//! [`crate::quoting::MYSQL_QUOTER`]; every value is bound as a driver
//! parameter via `mysql_async::Params`, never string-interpolated.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, Quoter, StreamParams, StreamResult};
use conduit_types::{BackendKind, Field, FieldMap};
use mysql_async::prelude::*;
use mysql_async::{Params, Row, Value};

use crate::adapter::{wrap, MySqlConnection};
use crate::convert::row_to_field_map;

pub struct MySqlDataOperator {
    conn: MySqlConnection,
}

impl MySqlDataOperator {
    pub fn new(conn: MySqlConnection) -> Self {
        MySqlDataOperator { conn }
    }
}

fn to_value(field: &Field) -> Value {
    match field {
        Field::Boolean(b) => Value::Int(*b as i64),
        Field::Int(i) => Value::Int(*i),
        Field::UInt(u) => Value::UInt(*u),
        Field::Float(f) => Value::Double(*f),
        Field::String(s) => Value::Bytes(s.as_bytes().to_vec()),
        Field::Binary(b) => Value::Bytes(b.clone()),
        Field::Timestamp(t) => Value::Bytes(t.to_rfc3339().into_bytes()),
        Field::Json(v) => Value::Bytes(v.to_string().into_bytes()),
        Field::Null => Value::NULL,
    }
}

fn rows_to_maps(rows: Vec<Row>) -> Vec<FieldMap> {
    rows.iter().map(row_to_field_map).collect()
}

#[async_trait]
impl DataOperator for MySqlDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let mut conn = self.conn.conn().await?;
        let sql = format!("SELECT * FROM {} LIMIT {}", crate::quoting::MYSQL_QUOTER.quote(table), limit);
        let rows: Vec<Row> = conn.query(&sql).await.map_err(|e| wrap(e, "data.fetch"))?;
        Ok(rows_to_maps(rows))
    }

    async fn fetch_with_columns(
        &self,
        _cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        let mut conn = self.conn.conn().await?;
        let column_list = columns
            .iter()
            .map(|c| crate::quoting::MYSQL_QUOTER.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            column_list,
            crate::quoting::MYSQL_QUOTER.quote(table),
            limit
        );
        let rows: Vec<Row> = conn.query(&sql).await.map_err(|e| wrap(e, "data.fetch_with_columns"))?;
        Ok(rows_to_maps(rows))
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut conn = self.conn.conn().await?;
        let mut inserted = 0usize;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            if columns.is_empty() {
                continue;
            }
            let column_list = columns.iter().map(|c| crate::quoting::MYSQL_QUOTER.quote(c)).collect::<Vec<_>>().join(", ");
            let placeholders = columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                crate::quoting::MYSQL_QUOTER.quote(table),
                column_list,
                placeholders
            );
            let params = Params::Positional(columns.iter().map(|c| to_value(&row[*c])).collect());
            conn.exec_drop(&sql, params).await.map_err(|e| wrap(e, "data.insert"))?;
            inserted += conn.affected_rows() as usize;
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        _cx: &CancellationContext,
        table: &str,
        set: &FieldMap,
        where_keys: &FieldMap,
    ) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::MySql, "data.update", "where_keys"));
        }
        let mut conn = self.conn.conn().await?;
        let set_columns: Vec<&String> = set.keys().collect();
        let where_columns: Vec<&String> = where_keys.keys().collect();
        let set_clause = set_columns
            .iter()
            .map(|c| format!("{} = ?", crate::quoting::MYSQL_QUOTER.quote(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = where_columns
            .iter()
            .map(|c| format!("{} = ?", crate::quoting::MYSQL_QUOTER.quote(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            crate::quoting::MYSQL_QUOTER.quote(table),
            set_clause,
            where_clause
        );
        let mut values: Vec<Value> = set_columns.iter().map(|c| to_value(&set[*c])).collect();
        values.extend(where_columns.iter().map(|c| to_value(&where_keys[*c])));
        conn.exec_drop(&sql, Params::Positional(values)).await.map_err(|e| wrap(e, "data.update"))?;
        // Row-count mismatches are not errors (spec §4.3).
        Ok(conn.affected_rows() as usize)
    }

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // Degrades to insert, mirroring `conduit-postgres` (spec §9: no
        // primary-key info is available at this layer).
        self.insert(cx, table, rows).await
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::MySql, "data.delete", "where_keys"));
        }
        let mut conn = self.conn.conn().await?;
        let where_columns: Vec<&String> = where_keys.keys().collect();
        let where_clause = where_columns
            .iter()
            .map(|c| format!("{} = ?", crate::quoting::MYSQL_QUOTER.quote(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("DELETE FROM {} WHERE {}", crate::quoting::MYSQL_QUOTER.quote(table), where_clause);
        let values: Vec<Value> = where_columns.iter().map(|c| to_value(&where_keys[*c])).collect();
        conn.exec_drop(&sql, Params::Positional(values)).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(conn.affected_rows() as usize)
    }

    async fn stream(&self, _cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let mut conn = self.conn.conn().await?;
        let column_list = match &params.columns {
            Some(columns) => columns.iter().map(|c| crate::quoting::MYSQL_QUOTER.quote(c)).collect::<Vec<_>>().join(", "),
            None => "*".to_string(),
        };
        let batch_size = params.batch_size.max(1);
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            column_list,
            crate::quoting::MYSQL_QUOTER.quote(&params.table),
            batch_size + 1
        );
        let rows: Vec<Row> = conn.query(&sql).await.map_err(|e| wrap(e, "data.stream"))?;
        let has_more = rows.len() > batch_size;
        let mut data = rows_to_maps(rows);
        data.truncate(batch_size);
        Ok(StreamResult { data, has_more, cursor: None })
    }

    async fn execute_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<Vec<FieldMap>> {
        let mut conn = self.conn.conn().await?;
        let rows: Vec<Row> = conn.query(query).await.map_err(|e| wrap(e, "data.execute_query"))?;
        Ok(rows_to_maps(rows))
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<u64> {
        let mut conn = self.conn.conn().await?;
        let count: Option<u64> = conn.query_first(query).await.map_err(|e| wrap(e, "data.execute_count_query"))?;
        Ok(count.unwrap_or(0))
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let mut conn = self.conn.conn().await?;
        let where_clause = if filter.is_empty() { String::new() } else { format!(" WHERE {filter}") };
        let sql = format!("SELECT COUNT(*) FROM {}{}", crate::quoting::MYSQL_QUOTER.quote(table), where_clause);
        let count: Option<u64> = conn.query_first(&sql).await.map_err(|e| wrap(e, "data.get_row_count"))?;
        Ok(count.unwrap_or(0))
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        let mut conn = self.conn.conn().await?;
        let sql = format!("TRUNCATE TABLE {}", crate::quoting::MYSQL_QUOTER.quote(table));
        conn.query_drop(&sql).await.map_err(|e| wrap(e, "data.wipe"))
    }
}
