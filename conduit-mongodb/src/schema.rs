//! `SchemaOperator` for MongoDB (spec §4.1, §4.5): MongoDB has no catalog
//! to read column types from, so discovery samples a bounded number of
//! documents per collection and votes on each field's `bsonType`, the same
//! "sample documents and infer" approach `conduit-kafka`'s stream
//! discoverer uses for schemaless topics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use conduit_contract::create_structure::{run_create_structure, CreateStep, DdlTransactionality};
use conduit_contract::{CancellationContext, ConduitResult, SchemaOperator};
use conduit_types::{Column, Table, UnifiedModel};
use futures::stream::TryStreamExt;

use crate::adapter::{wrap, MongoConnection};
use crate::convert::{bson_type_name, native_to_unified, unified_to_bson_type};

const SAMPLE_SIZE: i64 = 100;

pub struct MongoSchemaOperator {
    conn: MongoConnection,
}

impl MongoSchemaOperator {
    pub fn new(conn: MongoConnection) -> Self {
        MongoSchemaOperator { conn }
    }

    async fn sample_collection(&self, name: &str) -> ConduitResult<Table> {
        let collection = self.conn.database().collection::<bson::Document>(name);
        let pipeline = vec![bson::doc! { "$sample": { "size": SAMPLE_SIZE } }];
        let mut cursor = collection.aggregate(pipeline, None).await.map_err(|e| wrap(e, "schema.discover.sample"))?;

        // Votes the most-frequent bsonType per key across the sample
        // rather than trusting the first document, since a real collection
        // can legitimately mix shapes across documents.
        let mut votes: BTreeMap<String, BTreeMap<&'static str, usize>> = BTreeMap::new();
        let mut seen = 0usize;
        while let Some(doc) = cursor.try_next().await.map_err(|e| wrap(e, "schema.discover.sample"))? {
            seen += 1;
            for (key, value) in &doc {
                if key == "_id" {
                    continue;
                }
                *votes.entry(key.clone()).or_default().entry(bson_type_name(value)).or_insert(0) += 1;
            }
        }

        let mut columns = BTreeMap::new();
        columns.insert(
            "_id".to_string(),
            Column { name: "_id".to_string(), data_type: conduit_types::FieldType::String, native_type: Some("objectId".to_string()), nullable: false, default: None },
        );
        for (key, type_votes) in votes {
            let winner = type_votes.into_iter().max_by_key(|(_, count)| *count).map(|(t, _)| t).unwrap_or("string");
            columns.insert(
                key.clone(),
                Column {
                    // A field missing from some sampled documents is
                    // MongoDB's ordinary way of saying "optional".
                    nullable: true,
                    data_type: native_to_unified(winner),
                    native_type: Some(winner.to_string()),
                    default: None,
                    name: key,
                },
            );
        }
        let _ = seen;

        Ok(Table { name: name.to_string(), comment: None, columns, indexes: BTreeMap::new(), constraints: BTreeMap::new() })
    }
}

#[async_trait]
impl SchemaOperator for MongoSchemaOperator {
    async fn discover_schema(&self, cx: &CancellationContext) -> ConduitResult<UnifiedModel> {
        let names = self.list_tables(cx).await?;
        let mut model = UnifiedModel::default();
        for name in names {
            let table = self.sample_collection(&name).await?;
            model.tables.insert(name, table);
        }
        Ok(model)
    }

    async fn create_structure(&self, _cx: &CancellationContext, model: &UnifiedModel) -> ConduitResult<()> {
        // `createCollection` with a `$jsonSchema` validator is MongoDB's
        // closest equivalent to declaring column types up front; every
        // other unified object kind (indexes, constraints) has no
        // collection-level counterpart and is skipped.
        let mut steps: Vec<CreateStep<'_>> = Vec::new();
        for table in model.tables.values() {
            let properties: bson::Document = table
                .columns
                .values()
                .map(|c| (c.name.clone(), bson::Bson::String(unified_to_bson_type(c.data_type).to_string())))
                .collect();
            let validator = bson::doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "properties": properties.iter().map(|(k, v)| (k.clone(), bson::doc! { "bsonType": v.clone() })).collect::<bson::Document>(),
                }
            };
            let name = table.name.clone();
            steps.push(CreateStep::new("collections", async move {
                let options = mongodb::options::CreateCollectionOptions::builder().validator(validator).build();
                match self.conn.database().create_collection(&name, options).await {
                    Ok(()) => Ok(()),
                    // Re-running CreateStructure against an existing
                    // collection is idempotent, same as `IF NOT EXISTS` on
                    // the relational backends.
                    Err(e) if e.to_string().contains("already exists") => Ok(()),
                    Err(e) => Err(wrap(e, "schema.create_structure.collections")),
                }
            }));
        }
        run_create_structure(model, DdlTransactionality::StepByStep, steps).await
    }

    async fn list_tables(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        self.conn.database().list_collection_names(None).await.map_err(|e| wrap(e, "schema.list_tables"))
    }

    async fn get_table_schema(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<Table> {
        self.sample_collection(name).await
    }
}
