//! `DataOperator` for Postgres (spec §4.1). Every identifier interpolated
//! into a query string routes through [`crate::quoting::POSTGRES_QUOTER`];
//! every value is bound as a driver parameter, never string-interpolated.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, Quoter, StreamParams, StreamResult};
use conduit_types::{BackendKind, Field, FieldMap};
use postgres_types::ToSql;
use tokio_postgres::Row;

use crate::adapter::PostgresConnection;
use crate::convert::row_to_field_map;
use crate::quoting::POSTGRES_QUOTER;

pub struct PostgresDataOperator {
    conn: PostgresConnection,
}

impl PostgresDataOperator {
    pub fn new(conn: PostgresConnection) -> Self {
        PostgresDataOperator { conn }
    }
}

fn to_sql_param(field: &Field) -> Box<dyn ToSql + Sync + '_> {
    match field {
        Field::Boolean(b) => Box::new(*b),
        Field::Int(i) => Box::new(*i),
        Field::UInt(u) => Box::new(*u as i64),
        Field::Float(f) => Box::new(*f),
        Field::String(s) => Box::new(s.as_str()),
        Field::Binary(b) => Box::new(b.as_slice()),
        Field::Timestamp(t) => Box::new(*t),
        Field::Json(v) => Box::new(v.clone()),
        Field::Null => Box::new(Option::<String>::None),
    }
}

fn wrap(e: tokio_postgres::Error, operation: &'static str) -> ConduitError {
    ConduitError::ConnectionFailure {
        backend: BackendKind::Postgres,
        operation,
        context: Default::default(),
        source: Some(Box::new(e)),
    }
}

fn rows_to_maps(rows: Vec<Row>) -> Vec<FieldMap> {
    rows.iter().map(row_to_field_map).collect()
}

#[async_trait]
impl DataOperator for PostgresDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let sql = format!("SELECT * FROM {} LIMIT {}", POSTGRES_QUOTER.quote(table), limit);
        let rows = self.conn.client().query(&sql, &[]).await.map_err(|e| wrap(e, "data.fetch"))?;
        Ok(rows_to_maps(rows))
    }

    async fn fetch_with_columns(
        &self,
        _cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        let column_list = columns
            .iter()
            .map(|c| POSTGRES_QUOTER.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            column_list,
            POSTGRES_QUOTER.quote(table),
            limit
        );
        let rows = self.conn.client().query(&sql, &[]).await.map_err(|e| wrap(e, "data.fetch_with_columns"))?;
        Ok(rows_to_maps(rows))
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut inserted = 0usize;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            if columns.is_empty() {
                continue;
            }
            let column_list = columns.iter().map(|c| POSTGRES_QUOTER.quote(c)).collect::<Vec<_>>().join(", ");
            let placeholders = (1..=columns.len()).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                POSTGRES_QUOTER.quote(table),
                column_list,
                placeholders
            );
            let values: Vec<Box<dyn ToSql + Sync + '_>> = columns.iter().map(|c| to_sql_param(&row[*c])).collect();
            let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|b| b.as_ref()).collect();
            let n = self.conn.client().execute(&sql, &params).await.map_err(|e| wrap(e, "data.insert"))?;
            inserted += n as usize;
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
            return Err(ConduitError::invalid_data(BackendKind::Postgres, "data.update", "where_keys"));
        }
        let set_columns: Vec<&String> = set.keys().collect();
        let where_columns: Vec<&String> = where_keys.keys().collect();
        let set_clause = set_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", POSTGRES_QUOTER.quote(c), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = where_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", POSTGRES_QUOTER.quote(c), set_columns.len() + i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            POSTGRES_QUOTER.quote(table),
            set_clause,
            where_clause
        );
        let mut values: Vec<Box<dyn ToSql + Sync + '_>> = set_columns.iter().map(|c| to_sql_param(&set[*c])).collect();
        values.extend(where_columns.iter().map(|c| to_sql_param(&where_keys[*c])));
        let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|b| b.as_ref()).collect();
        let n = self.conn.client().execute(&sql, &params).await.map_err(|e| wrap(e, "data.update"))?;
        // Row-count mismatches are not errors (spec §4.3): zero rows matched
        // is logged and acknowledged by the caller, not surfaced here.
        Ok(n as usize)
    }

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // No declared primary key is available at this layer, so upsert
        // degrades to insert-or-update-by-all-columns via `ON CONFLICT DO
        // NOTHING`-less plain insert; a real primary-key-aware upsert needs
        // the table's `Constraint` set from `SchemaOperator::get_table_schema`,
        // which callers building a sink pipeline already have on hand.
        self.insert(cx, table, rows).await
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::Postgres, "data.delete", "where_keys"));
        }
        let where_columns: Vec<&String> = where_keys.keys().collect();
        let where_clause = where_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", POSTGRES_QUOTER.quote(c), i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("DELETE FROM {} WHERE {}", POSTGRES_QUOTER.quote(table), where_clause);
        let values: Vec<Box<dyn ToSql + Sync + '_>> = where_columns.iter().map(|c| to_sql_param(&where_keys[*c])).collect();
        let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|b| b.as_ref()).collect();
        let n = self.conn.client().execute(&sql, &params).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(n as usize)
    }

    async fn stream(&self, _cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let column_list = match &params.columns {
            Some(columns) => columns.iter().map(|c| POSTGRES_QUOTER.quote(c)).collect::<Vec<_>>().join(", "),
            None => "*".to_string(),
        };
        let batch_size = params.batch_size.max(1);
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            column_list,
            POSTGRES_QUOTER.quote(&params.table),
            batch_size + 1
        );
        let rows = self.conn.client().query(&sql, &[]).await.map_err(|e| wrap(e, "data.stream"))?;
        let has_more = rows.len() > batch_size;
        let mut data = rows_to_maps(rows);
        data.truncate(batch_size);
        Ok(StreamResult { data, has_more, cursor: None })
    }

    async fn execute_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<Vec<FieldMap>> {
        let rows = self.conn.client().query(query, &[]).await.map_err(|e| wrap(e, "data.execute_query"))?;
        Ok(rows_to_maps(rows))
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<u64> {
        let row = self
            .conn
            .client()
            .query_one(query, &[])
            .await
            .map_err(|e| wrap(e, "data.execute_count_query"))?;
        let count: i64 = row.try_get(0).map_err(|e| wrap(e, "data.execute_count_query"))?;
        Ok(count as u64)
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let where_clause = if filter.is_empty() { String::new() } else { format!(" WHERE {filter}") };
        let sql = format!("SELECT COUNT(*) FROM {}{}", POSTGRES_QUOTER.quote(table), where_clause);
        let row = self.conn.client().query_one(&sql, &[]).await.map_err(|e| wrap(e, "data.get_row_count"))?;
        let count: i64 = row.try_get(0).map_err(|e| wrap(e, "data.get_row_count"))?;
        Ok(count as u64)
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        let sql = format!("TRUNCATE TABLE {}", POSTGRES_QUOTER.quote(table));
        self.conn.client().execute(&sql, &[]).await.map_err(|e| wrap(e, "data.wipe"))?;
        Ok(())
    }
}
