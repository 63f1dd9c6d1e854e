//! `DataOperator` for Neo4j (spec §4.1): `table` names a node label.
//! Every identifier routes through [`crate::quoting::NEO4J_QUOTER`]; every
//! value is bound via `neo4rs::Query::param`, never string-interpolated.

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, DataOperator, Quoter, StreamParams, StreamResult};
use conduit_types::{BackendKind, Field, FieldMap};
use neo4rs::{query, BoltType, Node};

use crate::adapter::{wrap, Neo4jConnection};
use crate::convert::node_to_field_map;

pub struct Neo4jDataOperator {
    conn: Neo4jConnection,
}

impl Neo4jDataOperator {
    pub fn new(conn: Neo4jConnection) -> Self {
        Neo4jDataOperator { conn }
    }
}

fn to_bolt(field: &Field) -> BoltType {
    match field {
        Field::Boolean(b) => BoltType::from(*b),
        Field::Int(i) => BoltType::from(*i),
        Field::UInt(u) => BoltType::from(*u as i64),
        Field::Float(f) => BoltType::from(*f),
        Field::String(s) => BoltType::from(s.as_str()),
        Field::Binary(b) => BoltType::from(b.clone()),
        Field::Timestamp(t) => BoltType::from(t.to_rfc3339()),
        Field::Json(v) => BoltType::from(v.to_string()),
        Field::Null => BoltType::Null(neo4rs::BoltNull),
    }
}

/// Neo4j's internal id (`node_id`/`relationship_id` in CDC metadata) is
/// exposed only via `id(n)`, never as a property — `node_to_field_map`
/// never writes it onto the node, so it must never be matched as
/// `n.node_id = ...`.
fn is_internal_id_key(key: &str) -> bool {
    key == "node_id" || key == "relationship_id"
}

fn where_clause(where_keys: &FieldMap) -> (String, Vec<(String, BoltType)>) {
    let clauses: Vec<String> = where_keys
        .keys()
        .map(|k| {
            if is_internal_id_key(k) {
                format!("id(n) = $where_{k}")
            } else {
                format!("n.{} = $where_{}", NEO4J_QUOTER.quote(k), k)
            }
        })
        .collect();
    let params = where_keys.iter().map(|(k, v)| (format!("where_{k}"), to_bolt(v))).collect();
    (clauses.join(" AND "), params)
}

use crate::quoting::NEO4J_QUOTER;

#[async_trait]
impl DataOperator for Neo4jDataOperator {
    async fn fetch(&self, _cx: &CancellationContext, table: &str, limit: usize) -> ConduitResult<Vec<FieldMap>> {
        let cypher = format!("MATCH (n:{}) RETURN n LIMIT {limit}", NEO4J_QUOTER.quote(table));
        let mut stream = self.conn.graph().execute(query(&cypher)).await.map_err(|e| wrap(e, "data.fetch"))?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| wrap(e, "data.fetch"))? {
            if let Some(node) = row.get::<Node>("n") {
                rows.push(node_to_field_map(&node));
            }
        }
        Ok(rows)
    }

    async fn fetch_with_columns(
        &self,
        cx: &CancellationContext,
        table: &str,
        _columns: &[String],
        limit: usize,
    ) -> ConduitResult<Vec<FieldMap>> {
        // Neo4j has no projection pushdown benefit over fetching the whole
        // node at this layer; callers filter client-side.
        self.fetch(cx, table, limit).await
    }

    async fn insert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        let mut inserted = 0usize;
        for row in rows {
            let assignments: Vec<String> = row.keys().map(|k| format!("{}: $prop_{}", NEO4J_QUOTER.quote(k), k)).collect();
            let cypher = format!("CREATE (n:{} {{{}}})", NEO4J_QUOTER.quote(table), assignments.join(", "));
            let mut q = query(&cypher);
            for (k, v) in row {
                q = q.param(&format!("prop_{k}"), to_bolt(v));
            }
            self.conn.graph().run(q).await.map_err(|e| wrap(e, "data.insert"))?;
            inserted += 1;
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
            return Err(ConduitError::invalid_data(BackendKind::Neo4j, "data.update", "where_keys"));
        }
        let (predicate, where_params) = where_clause(where_keys);
        let set_clause: Vec<String> = set.keys().map(|k| format!("n.{} = $set_{}", NEO4J_QUOTER.quote(k), k)).collect();
        let cypher = format!(
            "MATCH (n:{}) WHERE {predicate} SET {}",
            NEO4J_QUOTER.quote(table),
            set_clause.join(", ")
        );
        let mut q = query(&cypher);
        for (k, v) in set {
            q = q.param(&format!("set_{k}"), to_bolt(v));
        }
        for (name, value) in where_params {
            q = q.param(&name, value);
        }
        self.conn.graph().run(q).await.map_err(|e| wrap(e, "data.update"))?;
        // Neo4j's driver doesn't report an affected-node count from `run`;
        // treated as "acknowledged" rather than surfacing a fabricated
        // count (spec §4.3 row-count mismatches are non-fatal regardless).
        Ok(1)
    }

    async fn upsert(&self, _cx: &CancellationContext, table: &str, rows: &[FieldMap]) -> ConduitResult<usize> {
        // Neo4j has `MERGE`, but without a declared key property this
        // degrades to the same replace-on-conflict semantics
        // `conduit-neo4j`'s CDC applier uses for `Insert` (see DESIGN.md).
        let mut upserted = 0usize;
        for row in rows {
            let assignments: Vec<String> = row.keys().map(|k| format!("{}: $prop_{}", NEO4J_QUOTER.quote(k), k)).collect();
            let cypher = format!("MERGE (n:{} {{{}}})", NEO4J_QUOTER.quote(table), assignments.join(", "));
            let mut q = query(&cypher);
            for (k, v) in row {
                q = q.param(&format!("prop_{k}"), to_bolt(v));
            }
            self.conn.graph().run(q).await.map_err(|e| wrap(e, "data.upsert"))?;
            upserted += 1;
        }
        Ok(upserted)
    }

    async fn delete(&self, _cx: &CancellationContext, table: &str, where_keys: &FieldMap) -> ConduitResult<usize> {
        if where_keys.is_empty() {
            return Err(ConduitError::invalid_data(BackendKind::Neo4j, "data.delete", "where_keys"));
        }
        let (predicate, where_params) = where_clause(where_keys);
        let cypher = format!("MATCH (n:{}) WHERE {predicate} DETACH DELETE n", NEO4J_QUOTER.quote(table));
        let mut q = query(&cypher);
        for (name, value) in where_params {
            q = q.param(&name, value);
        }
        self.conn.graph().run(q).await.map_err(|e| wrap(e, "data.delete"))?;
        Ok(1)
    }

    async fn stream(&self, cx: &CancellationContext, params: &StreamParams) -> ConduitResult<StreamResult> {
        let batch_size = params.batch_size.max(1);
        let data = self.fetch(cx, &params.table, batch_size + 1).await?;
        let has_more = data.len() > batch_size;
        let mut data = data;
        data.truncate(batch_size);
        Ok(StreamResult { data, has_more, cursor: None })
    }

    async fn execute_query(&self, _cx: &CancellationContext, query_text: &str) -> ConduitResult<Vec<FieldMap>> {
        let mut stream = self.conn.graph().execute(query(query_text)).await.map_err(|e| wrap(e, "data.execute_query"))?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| wrap(e, "data.execute_query"))? {
            if let Some(node) = row.get::<Node>("n") {
                rows.push(node_to_field_map(&node));
            }
        }
        Ok(rows)
    }

    async fn execute_count_query(&self, _cx: &CancellationContext, query_text: &str) -> ConduitResult<u64> {
        let mut stream = self.conn.graph().execute(query(query_text)).await.map_err(|e| wrap(e, "data.execute_count_query"))?;
        let count = stream
            .next()
            .await
            .map_err(|e| wrap(e, "data.execute_count_query"))?
            .and_then(|row| row.get::<i64>("count"))
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn get_row_count(&self, _cx: &CancellationContext, table: &str, filter: &str) -> ConduitResult<u64> {
        let predicate = if filter.is_empty() { String::new() } else { format!(" WHERE {filter}") };
        let cypher = format!("MATCH (n:{}){predicate} RETURN count(n) AS count", NEO4J_QUOTER.quote(table));
        let mut stream = self.conn.graph().execute(query(&cypher)).await.map_err(|e| wrap(e, "data.get_row_count"))?;
        let count = stream
            .next()
            .await
            .map_err(|e| wrap(e, "data.get_row_count"))?
            .and_then(|row| row.get::<i64>("count"))
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn wipe(&self, _cx: &CancellationContext, table: &str) -> ConduitResult<()> {
        let cypher = format!("MATCH (n:{}) DETACH DELETE n", NEO4J_QUOTER.quote(table));
        self.conn.graph().run(query(&cypher)).await.map_err(|e| wrap(e, "data.wipe"))
    }
}
