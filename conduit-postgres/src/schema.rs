//! `SchemaOperator` for Postgres (spec §4.1, §4.5): catalog discovery
//! against `information_schema`, excluding `pg_catalog`/`information_schema`
//! themselves, and `CreateStructure` walking the fixed dependency order via
//! [`conduit_contract::create_structure`].

use async_trait::async_trait;
use conduit_contract::create_structure::{run_create_structure, CreateStep, DdlTransactionality};
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, Quoter, SchemaOperator};
use conduit_types::{BackendKind, Column, Constraint, ConstraintType, Index, Table, UnifiedModel};
use std::collections::BTreeMap;

use crate::adapter::PostgresConnection;
use crate::convert::{native_to_unified, unified_to_native};
use crate::quoting::POSTGRES_QUOTER;

pub struct PostgresSchemaOperator {
    conn: PostgresConnection,
}

impl PostgresSchemaOperator {
    pub fn new(conn: PostgresConnection) -> Self {
        PostgresSchemaOperator { conn }
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

#[async_trait]
impl SchemaOperator for PostgresSchemaOperator {
    async fn discover_schema(&self, _cx: &CancellationContext) -> ConduitResult<UnifiedModel> {
        let mut model = UnifiedModel::default();

        let table_rows = self
            .conn
            .client()
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema') AND table_type = 'BASE TABLE'",
                &[],
            )
            .await
            .map_err(|e| wrap(e, "schema.discover.list_tables"))?;

        for row in table_rows {
            let table_name: String = row.get(0);
            match self.get_table_schema(_cx, &table_name).await {
                Ok(table) => {
                    model.tables.insert(table_name, table);
                }
                Err(e) => {
                    // Per spec §4.5: "on failure, record a diagnostic and
                    // continue — never abort the whole discovery."
                    log::warn!("discover_schema: describing table `{table_name}` failed: {e}");
                }
            }
        }

        Ok(model)
    }

    async fn create_structure(&self, _cx: &CancellationContext, model: &UnifiedModel) -> ConduitResult<()> {
        let mut steps: Vec<CreateStep<'_>> = Vec::new();
        for table in model.tables.values() {
            let ddl = build_create_table_ddl(table);
            steps.push(CreateStep::new("tables", async move {
                self.conn
                    .client()
                    .batch_execute(&ddl)
                    .await
                    .map_err(|e| wrap(e, "schema.create_structure.tables"))
            }));
        }
        run_create_structure(model, DdlTransactionality::Transactional, steps).await
    }

    async fn list_tables(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        let rows = self
            .conn
            .client()
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema') AND table_type = 'BASE TABLE'",
                &[],
            )
            .await
            .map_err(|e| wrap(e, "schema.list_tables"))?;
        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }

    async fn get_table_schema(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        let column_rows = self
            .conn
            .client()
            .query(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
                &[&name],
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.columns"))?;

        if column_rows.is_empty() {
            return Err(ConduitError::NotFound {
                backend: BackendKind::Postgres,
                operation: "schema.get_table_schema",
                context: conduit_contract::context([("table", name.to_string())]),
            });
        }

        let mut columns = BTreeMap::new();
        for row in &column_rows {
            let column_name: String = row.get(0);
            let native_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let default: Option<String> = row.get(3);
            columns.insert(
                column_name.clone(),
                Column {
                    name: column_name,
                    data_type: native_to_unified(&native_type),
                    native_type: Some(native_type),
                    nullable: is_nullable == "YES",
                    default,
                },
            );
        }

        let constraint_rows = self
            .conn
            .client()
            .query(
                "SELECT tc.constraint_name, tc.constraint_type, kcu.column_name, ccu.table_name AS ref_table \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
                 LEFT JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name AND tc.constraint_type = 'FOREIGN KEY' \
                 WHERE tc.table_name = $1",
                &[&name],
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.constraints"))?;

        let mut constraints: BTreeMap<String, Constraint> = BTreeMap::new();
        for row in &constraint_rows {
            let constraint_name: String = row.get(0);
            let raw_type: String = row.get(1);
            let column_name: String = row.get(2);
            let ref_table: Option<String> = row.get(3);
            let constraint_type = match raw_type.as_str() {
                "PRIMARY KEY" => ConstraintType::PrimaryKey,
                "FOREIGN KEY" => ConstraintType::ForeignKey,
                "UNIQUE" => ConstraintType::Unique,
                "CHECK" => ConstraintType::Check,
                _ => continue,
            };
            constraints
                .entry(constraint_name.clone())
                .and_modify(|c| c.columns.push(column_name.clone()))
                .or_insert(Constraint {
                    name: constraint_name,
                    constraint_type,
                    columns: vec![column_name],
                    reference: ref_table,
                    check_expression: None,
                });
        }

        let index_rows = self
            .conn
            .client()
            .query(
                "SELECT indexname, indexdef FROM pg_indexes WHERE tablename = $1",
                &[&name],
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.indexes"))?;
        let mut indexes = BTreeMap::new();
        for row in &index_rows {
            let index_name: String = row.get(0);
            let def: String = row.get(1);
            indexes.insert(
                index_name.clone(),
                Index {
                    name: index_name,
                    columns: Vec::new(),
                    unique: def.contains("UNIQUE"),
                },
            );
        }

        Ok(Table {
            name: name.to_string(),
            comment: None,
            columns,
            indexes,
            constraints,
        })
    }
}

fn build_create_table_ddl(table: &Table) -> String {
    let column_defs = table
        .columns
        .values()
        .map(|c| {
            let native = c.native_type.clone().unwrap_or_else(|| unified_to_native(c.data_type).to_string());
            let nullability = if c.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", POSTGRES_QUOTER.quote(&c.name), native, nullability)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        POSTGRES_QUOTER.quote(&table.name),
        column_defs
    )
}
