//! `SchemaOperator` for MySQL (spec §4.1, §4.5): catalog discovery against
//! `information_schema`, scoped to the connection's current database, and
//! `CreateStructure` via [`conduit_contract::create_structure`].

use async_trait::async_trait;
use conduit_contract::create_structure::{run_create_structure, CreateStep, DdlTransactionality};
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, Quoter, SchemaOperator};
use conduit_types::{BackendKind, Column, Constraint, ConstraintType, Index, Table, UnifiedModel};
use mysql_async::prelude::*;
use std::collections::BTreeMap;

use crate::adapter::{wrap, MySqlConnection};
use crate::convert::{native_to_unified, unified_to_native};
use crate::quoting::MYSQL_QUOTER;

pub struct MySqlSchemaOperator {
    conn: MySqlConnection,
}

impl MySqlSchemaOperator {
    pub fn new(conn: MySqlConnection) -> Self {
        MySqlSchemaOperator { conn }
    }
}

#[async_trait]
impl SchemaOperator for MySqlSchemaOperator {
    async fn discover_schema(&self, cx: &CancellationContext) -> ConduitResult<UnifiedModel> {
        let mut model = UnifiedModel::default();
        for table_name in self.list_tables(cx).await? {
            match self.get_table_schema(cx, &table_name).await {
                Ok(table) => {
                    model.tables.insert(table_name, table);
                }
                Err(e) => {
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
                let mut conn = self.conn.conn().await?;
                conn.query_drop(&ddl).await.map_err(|e| wrap(e, "schema.create_structure.tables"))
            }));
        }
        run_create_structure(model, DdlTransactionality::StepByStep, steps).await
    }

    async fn list_tables(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        let mut conn = self.conn.conn().await?;
        let rows: Vec<String> = conn
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'",
            )
            .await
            .map_err(|e| wrap(e, "schema.list_tables"))?;
        Ok(rows)
    }

    async fn get_table_schema(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        let mut conn = self.conn.conn().await?;
        let column_rows: Vec<(String, String, String, Option<String>)> = conn
            .exec(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
                (name,),
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.columns"))?;

        if column_rows.is_empty() {
            return Err(ConduitError::NotFound {
                backend: BackendKind::MySql,
                operation: "schema.get_table_schema",
                context: conduit_contract::context([("table", name.to_string())]),
            });
        }

        let mut columns = BTreeMap::new();
        for (column_name, native_type, is_nullable, default) in column_rows {
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

        let constraint_rows: Vec<(String, String, String, Option<String>)> = conn
            .exec(
                "SELECT tc.constraint_name, tc.constraint_type, kcu.column_name, kcu.referenced_table_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 WHERE tc.table_schema = DATABASE() AND tc.table_name = ?",
                (name,),
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.constraints"))?;

        let mut constraints: BTreeMap<String, Constraint> = BTreeMap::new();
        for (constraint_name, raw_type, column_name, ref_table) in constraint_rows {
            let constraint_type = match raw_type.as_str() {
                "PRIMARY KEY" => ConstraintType::PrimaryKey,
                "FOREIGN KEY" => ConstraintType::ForeignKey,
                "UNIQUE" => ConstraintType::Unique,
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

        let index_rows: Vec<(String, u8)> = conn
            .exec(
                "SELECT index_name, non_unique FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = ? GROUP BY index_name, non_unique",
                (name,),
            )
            .await
            .map_err(|e| wrap(e, "schema.get_table_schema.indexes"))?;
        let mut indexes = BTreeMap::new();
        for (index_name, non_unique) in index_rows {
            indexes.insert(
                index_name.clone(),
                Index {
                    name: index_name,
                    columns: Vec::new(),
                    unique: non_unique == 0,
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
            format!("{} {}{}", MYSQL_QUOTER.quote(&c.name), native, nullability)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", MYSQL_QUOTER.quote(&table.name), column_defs)
}
