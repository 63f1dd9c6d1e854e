//! `DataOperator` for Snowflake (spec §4.1). Every value written goes
//! through [`field_to_sql_literal`] rather than a bound parameter — see
//! [`crate::adapter`]'s module doc for why.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, Quoter, StreamParams, StreamResult};
use conduit_types::{BackendKind, FieldMap};

use crate::adapter::SnowflakeConnection;
use crate::convert::field_to_sql_literal;
use crate::quoting::SNOWFLAKE_QUOTER;

pub struct SnowflakeDataOperator {
    conn: SnowflakeConnection,
}

impl SnowflakeDataOperator {
    pub fn new(conn: SnowflakeConnection) -> Self {
        SnowflakeDataOperator { conn }
    }
}

#[async_trait]
impl DataOperator for SnowflakeDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        self.conn.query(&format!("SELECT * FROM {} LIMIT {}", SNOWFLAKE_QUOTER.quote(table), limit)).await
    }

    async fn fetch_with_columns(
        &self,
        _cx: &CancellationContext,
        table: &str,
        columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        let column_list = columns.iter().map(|c| SNOWFLAKE_QUOTER.quote(c)).collect::<Vec<_>>().join(", ");
        self.conn
            .query(&format!("SELECT {} FROM {} LIMIT {}", column_list, SNOWFLAKE_QUOTER.quote(table), limit))
            .await
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut inserted = 0usize;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            if columns.is_empty() {
                continue;
            }
            let column_list = columns.iter().map(|c| SNOWFLAKE_QUOTER.quote(c)).collect::<Vec<_>>().join(", ");
            let values = columns.iter().map(|c| field_to_sql_literal(&row[*c])).collect::<Vec<_>>().join(", ");
            let sql = format!("INSERT INTO {} ({}) VALUES ({})", SNOWFLAKE_QUOTER.quote(table), column_list, values);
            inserted += self.conn.execute(&sql).await? as usize;
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
            return Err(ConduitError::invalid_data(BackendKind::Snowflake, "data.update", "where_keys"));
        }
        let set_clause = set
            .iter()
            .map(|(k, v)| format!("{} = {}", SNOWFLAKE_QUOTER.quote(k), field_to_sql_literal(v)))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = where_keys
            .iter()
            .map(|(k, v)| format!("{} = {}", SNOWFLAKE_QUOTER.quote(k), field_to_sql_literal(v)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("UPDATE {} SET {} WHERE {}", SNOWFLAKE_QUOTER.quote(table), set_clause, where_clause);
        Ok(self.conn.execute(&sql).await? as usize)
    }

    async fn upsert(&self, cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // No declared primary key available at this layer (same rationale
        // as the Postgres path); a caller with schema in hand can build a
        // `MERGE` itself.
        self.insert(cx, table, rows).await
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::Snowflake, "data.delete", "where_keys"));
        }
        let where_clause = where_keys
            .iter()
            .map(|(k, v)| format!("{} = {}", SNOWFLAKE_QUOTER.quote(k), field_to_sql_literal(v)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!("DELETE FROM {} WHERE {}", SNOWFLAKE_QUOTER.quote(table), where_clause);
        Ok(self.conn.execute(&sql).await? as usize)
    }

    async fn stream(&self, _cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let column_list = match &params.columns {
            Some(columns) => columns.iter().map(|c| SNOWFLAKE_QUOTER.quote(c)).collect::<Vec<_>>().join(", "),
            None => "*".to_string(),
        };
        let batch_size = params.batch_size.max(1);
        let sql = format!("SELECT {} FROM {} LIMIT {}", column_list, SNOWFLAKE_QUOTER.quote(&params.table), batch_size + 1);
        let mut data = self.conn.query(&sql).await?;
        let has_more = data.len() > batch_size;
        data.truncate(batch_size);
        Ok(StreamResult { data, has_more, cursor: None })
    }

    async fn execute_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<Vec<FieldMap>> {
        self.conn.query(query).await
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, query: &str) -> ConduitResult<u64> {
        let rows = self.conn.query(query).await?;
        let count = rows
            .first()
            .and_then(|row| row.values().next())
            .map(|f| f.to_display_string().parse::<u64>().unwrap_or(0))
            .unwrap_or(0);
        Ok(count)
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let where_clause = if filter.is_empty() { String::new() } else { format!(" WHERE {filter}") };
        let sql = format!("SELECT COUNT(*) AS CNT FROM {}{}", SNOWFLAKE_QUOTER.quote(table), where_clause);
        let rows = self.conn.query(&sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("CNT"))
            .map(|f| f.to_display_string().parse::<u64>().unwrap_or(0))
            .unwrap_or(0))
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        self.conn.execute(&format!("TRUNCATE TABLE {}", SNOWFLAKE_QUOTER.quote(table))).await?;
        Ok(())
    }
}
