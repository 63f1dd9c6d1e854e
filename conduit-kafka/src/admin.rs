//! `AdminOperator` for Kafka (spec §4.6), built on rdkafka's `AdminClient`.

use std::time::Duration;

use async_trait::async_trait;
use conduit_contract::{AdminOperator, CancellationContext, ConduitError, ConduitResult, TopicMetadata};
use conduit_types::{BackendKind, Field, FieldMap};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, ResourceSpecifier, TopicReplication};
use rdkafka::client::DefaultClientContext;

use crate::adapter::KafkaConnection;

pub struct KafkaAdminOperator {
    admin: AdminClient<DefaultClientContext>,
}

impl KafkaAdminOperator {
    pub fn new(conn: &KafkaConnection) -> ConduitResult<Self> {
        let admin: AdminClient<DefaultClientContext> =
            conn.config().clone().create().map_err(|e| crate::adapter::wrap(e, "admin.create"))?;
        Ok(KafkaAdminOperator { admin })
    }
}

#[async_trait]
impl AdminOperator for KafkaAdminOperator {
    async fn list_topics(&self, _cx: &CancellationContext) -> ConduitResult<Vec<String>> {
        let metadata = self
            .admin
            .inner()
            .fetch_metadata(None, Duration::from_secs(30))
            .map_err(|e| crate::adapter::wrap(e, "admin.list_topics"))?;
        Ok(metadata.topics().iter().map(|t| t.name().to_string()).collect())
    }

    async fn create_topic(&self, _cx: &CancellationContext, name: &str, partitions: usize) -> ConduitResult<()> {
        let topic = NewTopic::new(name, partitions as i32, TopicReplication::Fixed(1));
        let results = self
            .admin
            .create_topics(&[topic], &AdminOptions::new())
            .await
            .map_err(|e| crate::adapter::wrap(e, "admin.create_topic"))?;
        for result in results {
            result.map_err(|(topic, err)| ConduitError::ConnectionFailure {
                backend: BackendKind::Kafka,
                operation: "admin.create_topic",
                context: conduit_contract::context([("topic", topic), ("reason", err.to_string())]),
                source: None,
            })?;
        }
        Ok(())
    }

    async fn delete_topic(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<()> {
        let results = self
            .admin
            .delete_topics(&[name], &AdminOptions::new())
            .await
            .map_err(|e| crate::adapter::wrap(e, "admin.delete_topic"))?;
        for result in results {
            result.map_err(|(topic, err)| ConduitError::ConnectionFailure {
                backend: BackendKind::Kafka,
                operation: "admin.delete_topic",
                context: conduit_contract::context([("topic", topic), ("reason", err.to_string())]),
                source: None,
            })?;
        }
        Ok(())
    }

    async fn get_topic_metadata(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<TopicMetadata> {
        let metadata = self
            .admin
            .inner()
            .fetch_metadata(Some(name), Duration::from_secs(30))
            .map_err(|e| crate::adapter::wrap(e, "admin.get_topic_metadata"))?;
        let topic = metadata.topics().iter().find(|t| t.name() == name).ok_or_else(|| ConduitError::NotFound {
            backend: BackendKind::Kafka,
            operation: "admin.get_topic_metadata",
            context: conduit_contract::context([("topic", name.to_string())]),
        })?;
        let partition_count = topic.partitions().len();
        let replication_factor = topic.partitions().first().map(|p| p.replicas().len()).unwrap_or(0);
        Ok(TopicMetadata { name: name.to_string(), partition_count, replication_factor })
    }

    async fn get_topic_config(&self, _cx: &CancellationContext, name: &str) -> ConduitResult<FieldMap> {
        let resource = ResourceSpecifier::Topic(name);
        let results = self
            .admin
            .describe_configs(&[resource], &AdminOptions::new())
            .await
            .map_err(|e| crate::adapter::wrap(e, "admin.get_topic_config"))?;
        let mut fields = FieldMap::new();
        for result in results {
            let config = result.map_err(|(resource, err)| ConduitError::ConnectionFailure {
                backend: BackendKind::Kafka,
                operation: "admin.get_topic_config",
                context: conduit_contract::context([("resource", format!("{resource:?}")), ("reason", err.to_string())]),
                source: None,
            })?;
            for entry in config.entries {
                if let Some(value) = entry.value {
                    fields.insert(entry.name, Field::String(value));
                }
            }
        }
        Ok(fields)
    }
}
