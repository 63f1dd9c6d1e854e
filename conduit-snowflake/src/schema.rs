//! `SchemaOperator` for Snowflake (spec §4.1, §4.5): catalog discovery
//! against `INFORMATION_SCHEMA`, `CreateStructure` walking the workspace's
//! shared dependency order via [`conduit_contract::create_structure`].

use async_trait::async_trait;
use conduit_contract::create_structure::{run_create_structure, CreateStep, DdlTransactionality};
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, Quoter, SchemaOperator};
use conduit_types::{BackendKind, Column, Constraint, ConstraintType, Table, UnifiedModel};
use std::collections::BTreeMap;

use crate::adapter::SnowflakeConnection;
use crate::convert::{native_to_unified, unified_to_native};
use crate::quoting::SNOWFLAKE_QUOTER;

pub struct SnowflakeSchemaOperator {
    conn: SnowflakeConnection,
}

impl SnowflakeSchemaOperator {
    pub fn new(conn: SnowflakeConnection) -> Self {
        SnowflakeSchemaOperator { conn }
    }
}

#[async_trait]
impl SchemaOperator for SnowflakeSchemaOperator {
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
                self.conn.execute(&ddl).await.map(|_| ())
            }));
        }
        // Snowflake auto-commits each DDL statement; there is no multi-statement
        // transaction to wrap `CREATE TABLE`/`CREATE SEQUENCE` in, so steps run
        // one at a time rather than inside a `BEGIN`/`COMMIT` the teacher's
        // Postgres path uses.
        run_create_structure(model, DdlTransactionality::StepByStep, steps).await
    }

    async fn list_tables(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        let rows = self
            .conn
            .query("SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'")
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("TABLE_NAME").and_then(|f| f.as_str().map(str::to_string)))
            .collect())
    }

    async fn get_table_schema(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        let upper = name.to_uppercase();
        let column_rows = self
            .conn
            .query(&format!(
                "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_DEFAULT FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_NAME = '{upper}' ORDER BY ORDINAL_POSITION"
            ))
            .await?;

        if column_rows.is_empty() {
            return Err(ConduitError::NotFound {
                backend: BackendKind::Snowflake,
                operation: "schema.get_table_schema",
                context: conduit_contract::context([("table", name.to_string())]),
            });
        }

        let mut columns = BTreeMap::new();
        for row in &column_rows {
            let column_name = row.get("COLUMN_NAME").and_then(|f| f.as_str()).unwrap_or_default().to_string();
            let native_type = row.get("DATA_TYPE").and_then(|f| f.as_str()).unwrap_or_default().to_string();
            let is_nullable = row.get("IS_NULLABLE").and_then(|f| f.as_str()).unwrap_or("YES");
            let default = row.get("COLUMN_DEFAULT").and_then(|f| f.as_str()).map(str::to_string);
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
            .query(&format!(
                "SELECT tc.CONSTRAINT_NAME, tc.CONSTRAINT_TYPE, kcu.COLUMN_NAME \
                 FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                 WHERE tc.TABLE_NAME = '{upper}'"
            ))
            .await?;

        let mut constraints: BTreeMap<String, Constraint> = BTreeMap::new();
        for row in &constraint_rows {
            let constraint_name = row.get("CONSTRAINT_NAME").and_then(|f| f.as_str()).unwrap_or_default().to_string();
            let raw_type = row.get("CONSTRAINT_TYPE").and_then(|f| f.as_str()).unwrap_or_default();
            let column_name = row.get("COLUMN_NAME").and_then(|f| f.as_str()).unwrap_or_default().to_string();
            let constraint_type = match raw_type {
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
                    reference: None,
                    check_expression: None,
                });
        }

        Ok(Table {
            name: name.to_string(),
            comment: None,
            columns,
            indexes: BTreeMap::new(),
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
            format!("{} {}{}", SNOWFLAKE_QUOTER.quote(&c.name), native, nullability)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({})", SNOWFLAKE_QUOTER.quote(&table.name), column_defs)
}
