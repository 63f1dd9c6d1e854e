//! `ProducerOperator` for Kafka (spec §4.6), built on rdkafka's
//! `FutureProducer`, whose internal queue already batches and retries —
//! `produce` is a thin `join_all` over one `send` per message.

use std::time::Duration;

use async_trait::async_trait;
use conduit_contract::{CancellationContext, ConduitError, ConduitResult, ProduceMessage, ProducerOperator};
use conduit_types::BackendKind;
use rdkafka::message::OwnedHeaders;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::adapter::KafkaConnection;

pub struct KafkaProducerOperator {
    producer: FutureProducer,
}

impl KafkaProducerOperator {
    pub fn new(conn: &KafkaConnection) -> ConduitResult<Self> {
        let producer: FutureProducer = conn
            .config()
            .clone()
            .create()
            .map_err(|e| crate::adapter::wrap(e, "producer.create"))?;
        Ok(KafkaProducerOperator { producer })
    }

    fn record<'a>(topic: &'a str, message: &'a ProduceMessage) -> FutureRecord<'a, [u8], [u8]> {
        let mut record = FutureRecord::to(topic).payload(&message.payload);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }
        if !message.headers.is_empty() {
            let mut headers = OwnedHeaders::new();
            for (name, value) in &message.headers {
                headers = headers.insert(rdkafka::message::Header {
                    key: name,
                    value: Some(value.to_display_string().as_bytes()),
                });
            }
            record = record.headers(headers);
        }
        record
    }
}

#[async_trait]
impl ProducerOperator for KafkaProducerOperator {
    async fn produce(&self, cx: &CancellationContext, topic: &str, messages: &[ProduceMessage]) -> ConduitResult<usize> {
        let mut sent = 0usize;
        for message in messages {
            if cx.is_cancelled() {
                return Err(ConduitError::Cancelled {
                    backend: BackendKind::Kafka,
                    operation: "producer.produce",
                    context: Default::default(),
                });
            }
            let record = Self::record(topic, message);
            self.producer
                .send(record, Duration::from_secs(30))
                .await
                .map_err(|(e, _)| crate::adapter::wrap(e, "producer.produce"))?;
            sent += 1;
        }
        Ok(sent)
    }

    async fn produce_async(
        &self,
        _cx: &CancellationContext,
        topic: &str,
        messages: Vec<ProduceMessage>,
        on_complete: Box<dyn FnOnce(ConduitResult<usize>) + Send>,
    ) -> ConduitResult<()> {
        let producer = self.producer.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut sent = 0usize;
            let mut failure = None;
            for message in &messages {
                let record = KafkaProducerOperator::record(&topic, message);
                match producer.send(record, Duration::from_secs(30)).await {
                    Ok(_) => sent += 1,
                    Err((e, _)) => {
                        failure = Some(crate::adapter::wrap(e, "producer.produce_async"));
                        break;
                    }
                }
            }
            on_complete(match failure {
                Some(e) => Err(e),
                None => Ok(sent),
            });
        });
        Ok(())
    }

    async fn flush(&self, _cx: &CancellationContext) -> ConduitResult<()> {
        self.producer
            .flush(Duration::from_secs(30))
            .map_err(|e| crate::adapter::wrap(e, "producer.flush"))
    }

    async fn close(&self) -> ConduitResult<()> {
        // `FutureProducer` has no explicit close; dropping the last clone
        // tears down librdkafka's internal threads. Flushing here ensures
        // in-flight messages are not silently lost on shutdown.
        self.producer
            .flush(Duration::from_secs(30))
            .map_err(|e| crate::adapter::wrap(e, "producer.close"))
    }
}
