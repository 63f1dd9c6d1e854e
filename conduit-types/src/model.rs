//! The backend-agnostic schema vocabulary (C2): the shape `DiscoverSchema`
//! populates and `CreateStructure` consumes, shared by every adapter
//! regardless of whether the backend is relational, graph, or document.

use std::collections::BTreeMap;

use crate::field::FieldType;

/// A single column/property definition.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: FieldType,
    /// The backend-native type string this column was discovered with, kept
    /// alongside the normalized [`FieldType`] so `CreateStructure` can round
    /// trip through `unifiedToNative` without losing precision the unified
    /// type can't express (e.g. `VARCHAR(255)` vs `text`).
    pub native_type: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// The closed set of constraint kinds (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    PrimaryKey,
    ForeignKey,
    Unique,
    NotNull,
    Check,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Constraint {
    pub name: String,
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    /// For `ForeignKey`: the referenced table name. Spec §3: "or is
    /// explicitly unresolved" — `None` is a legal, representable state, not
    /// an error; `DiscoverSchema` sets it when the referenced table falls
    /// outside the discovered set (e.g. a cross-database reference).
    pub reference: Option<String>,
    pub check_expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub name: String,
    pub comment: Option<String>,
    pub columns: BTreeMap<String, Column>,
    pub indexes: BTreeMap<String, Index>,
    pub constraints: BTreeMap<String, Constraint>,
}

/// A graph node label definition.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub label: String,
    pub properties: BTreeMap<String, Column>,
    pub constraints: BTreeMap<String, Constraint>,
}

/// A graph relationship-type definition.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Relationship {
    pub rel_type: String,
    pub properties: BTreeMap<String, Column>,
    pub start_labels: Vec<String>,
    pub end_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Graph {
    pub name: String,
    pub node_labels: Vec<String>,
    pub relationship_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Schema {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct View {
    pub name: String,
    pub definition: Option<String>,
    pub columns: BTreeMap<String, Column>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Sequence {
    pub name: String,
    pub start: Option<i64>,
    pub increment: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Procedure {
    pub name: String,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: Option<FieldType>,
    pub definition: Option<String>,
}

/// A flattened projection of one schema object, handed to the
/// resource-registry sink's `UpsertResources` call (spec §4.7, §6).
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchDocument {
    pub container: String,
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ExternalTable {
    pub name: String,
    pub location: Option<String>,
    pub columns: BTreeMap<String, Column>,
}

/// The backend-agnostic schema snapshot (C2). Every map is keyed by name,
/// and the invariant `map[key].name == key` is checked by
/// [`UnifiedModel::validate`] rather than enforced by the type (a `BTreeMap`
/// can't express "key derived from value" structurally).
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct UnifiedModel {
    pub tables: BTreeMap<String, Table>,
    pub nodes: BTreeMap<String, Node>,
    pub relationships: BTreeMap<String, Relationship>,
    pub graphs: BTreeMap<String, Graph>,
    pub indexes: BTreeMap<String, Index>,
    pub constraints: BTreeMap<String, Constraint>,
    pub schemas: BTreeMap<String, Schema>,
    pub views: BTreeMap<String, View>,
    pub sequences: BTreeMap<String, Sequence>,
    pub procedures: BTreeMap<String, Procedure>,
    pub functions: BTreeMap<String, Function>,
    pub external_tables: BTreeMap<String, ExternalTable>,
}

/// One violation of a `UnifiedModel` invariant, returned in bulk by
/// [`UnifiedModel::validate`] so a caller can report every offending name at
/// once instead of failing fast on the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelViolation(pub String);

impl UnifiedModel {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.nodes.is_empty()
            && self.relationships.is_empty()
            && self.graphs.is_empty()
            && self.indexes.is_empty()
            && self.constraints.is_empty()
            && self.schemas.is_empty()
            && self.views.is_empty()
            && self.sequences.is_empty()
            && self.procedures.is_empty()
            && self.functions.is_empty()
            && self.external_tables.is_empty()
    }

    /// Checks the "every key equals the `Name` of its value" invariant
    /// (spec §3) across every object kind, plus foreign-key references that
    /// name a table outside this model's `tables` map are flagged as
    /// unresolved rather than rejected (spec §3: "or is explicitly
    /// unresolved").
    pub fn validate(&self) -> Vec<ModelViolation> {
        let mut violations = Vec::new();

        for (key, table) in &self.tables {
            if &table.name != key {
                violations.push(ModelViolation(format!(
                    "tables[{key}].name == {:?}, expected {key:?}",
                    table.name
                )));
            }
            for (ckey, column) in &table.columns {
                if &column.name != ckey {
                    violations.push(ModelViolation(format!(
                        "tables[{key}].columns[{ckey}].name == {:?}, expected {ckey:?}",
                        column.name
                    )));
                }
            }
            for (ckey, constraint) in &table.constraints {
                if constraint.constraint_type == ConstraintType::ForeignKey {
                    if let Some(reference) = &constraint.reference {
                        if !self.tables.contains_key(reference) {
                            violations.push(ModelViolation(format!(
                                "tables[{key}].constraints[{ckey}] references unresolved table {reference:?}"
                            )));
                        }
                    }
                }
            }
        }

        for (key, node) in &self.nodes {
            if &node.label != key {
                violations.push(ModelViolation(format!(
                    "nodes[{key}].label == {:?}, expected {key:?}",
                    node.label
                )));
            }
        }

        violations
    }

    /// Fixed dependency order `CreateStructure` walks (spec §4.1/§4.5):
    /// schemas → sequences → tables → views → constraints → indexes →
    /// functions → procedures. Graph backends additionally order
    /// constraints before indexes, which is already this order's relative
    /// placement, so a single ordering serves both families.
    /// Projects this model into a flat `(containers, items)` shape for the
    /// resource-registry sink (spec §4.7, §6 "`UpsertResources`"). Used by
    /// the Kafka schema-from-stream discoverer (C9) and available to any
    /// adapter's `DiscoverSchema` that wants to push a snapshot downstream.
    pub fn to_search_documents(&self) -> Vec<SearchDocument> {
        let mut docs = Vec::new();
        for table in self.tables.values() {
            docs.push(SearchDocument {
                container: "table".to_string(),
                name: table.name.clone(),
                fields: table
                    .columns
                    .keys()
                    .cloned()
                    .collect(),
            });
        }
        for node in self.nodes.values() {
            docs.push(SearchDocument {
                container: "node".to_string(),
                name: node.label.clone(),
                fields: node.properties.keys().cloned().collect(),
            });
        }
        docs
    }

    pub const CREATE_ORDER: [&'static str; 8] = [
        "schemas",
        "sequences",
        "tables",
        "views",
        "constraints",
        "indexes",
        "functions",
        "procedures",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_has_no_violations() {
        assert!(UnifiedModel::default().validate().is_empty());
    }

    #[test]
    fn mismatched_table_key_is_a_violation() {
        let mut model = UnifiedModel::default();
        model.tables.insert(
            "users".to_string(),
            Table {
                name: "other".to_string(),
                ..Default::default()
            },
        );
        let violations = model.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].0.contains("users"));
    }

    #[test]
    fn unresolved_foreign_key_reference_is_flagged() {
        let mut model = UnifiedModel::default();
        let mut table = Table {
            name: "orders".to_string(),
            ..Default::default()
        };
        table.constraints.insert(
            "fk_user".to_string(),
            Constraint {
                name: "fk_user".to_string(),
                constraint_type: ConstraintType::ForeignKey,
                columns: vec!["user_id".to_string()],
                reference: Some("users".to_string()),
                check_expression: None,
            },
        );
        model.tables.insert("orders".to_string(), table);
        let violations = model.validate();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].0.contains("unresolved"));
    }

    #[test]
    fn resolved_foreign_key_reference_is_not_flagged() {
        let mut model = UnifiedModel::default();
        model.tables.insert(
            "users".to_string(),
            Table {
                name: "users".to_string(),
                ..Default::default()
            },
        );
        let mut orders = Table {
            name: "orders".to_string(),
            ..Default::default()
        };
        orders.constraints.insert(
            "fk_user".to_string(),
            Constraint {
                name: "fk_user".to_string(),
                constraint_type: ConstraintType::ForeignKey,
                columns: vec!["user_id".to_string()],
                reference: Some("users".to_string()),
                check_expression: None,
            },
        );
        model.tables.insert("orders".to_string(), orders);
        assert!(model.validate().is_empty());
    }

    #[test]
    fn to_search_documents_covers_tables_and_nodes() {
        let mut model = UnifiedModel::default();
        model.tables.insert(
            "users".to_string(),
            Table {
                name: "users".to_string(),
                columns: BTreeMap::from([(
                    "id".to_string(),
                    Column {
                        name: "id".to_string(),
                        data_type: FieldType::Int,
                        native_type: None,
                        nullable: false,
                        default: None,
                    },
                )]),
                ..Default::default()
            },
        );
        let docs = model.to_search_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "users");
        assert_eq!(docs[0].fields, vec!["id".to_string()]);
    }
}
