//! Schema-from-Stream Discoverer (spec §4.7, C9): samples JSON messages
//! off a topic and maintains a best-effort `TopicSchema` per `(stream_id,
//! topic)` pair, projecting a snapshot into `SearchDocument`s every 100
//! messages for the resource-registry sink.
//!
//! Concurrency matches spec §4.7 exactly: "a single-writer map ... guarded
//! by a mutex" rather than a lock-free structure, since sampling is not a
//! hot path and a plain `Mutex` keeps this readable.

use std::collections::HashMap;
use std::sync::Mutex;

use conduit_types::SearchDocument;
use serde_json::Value;

/// Coarse JSON type buckets (spec §4.7): no attempt to distinguish int vs
/// float, or to merge with the richer [`conduit_types::FieldType`] — this
/// is a best-effort inference from sampled wire bytes, not a driver-backed
/// catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InferredType {
    Boolean,
    Number,
    String,
    Object,
    Array,
    Null,
}

impl InferredType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => InferredType::Boolean,
            Value::Number(_) => InferredType::Number,
            Value::String(_) => InferredType::String,
            Value::Object(_) => InferredType::Object,
            Value::Array(_) => InferredType::Array,
            Value::Null => InferredType::Null,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            InferredType::Boolean => "boolean",
            InferredType::Number => "number",
            InferredType::String => "string",
            InferredType::Object => "object",
            InferredType::Array => "array",
            InferredType::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldStats {
    pub inferred_type: Option<InferredType>,
    pub occurrences: u64,
}

/// Confidence buckets derived purely from sample count (spec §4.7: "<10 →
/// 0.1, <100 → 0.5, <1000 → 0.8, >=1000 → 0.95").
fn confidence_for(sample_count: u64) -> f64 {
    if sample_count < 10 {
        0.1
    } else if sample_count < 100 {
        0.5
    } else if sample_count < 1000 {
        0.8
    } else {
        0.95
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicSchema {
    pub fields: HashMap<String, FieldStats>,
    pub messages_sampled: u64,
}

impl TopicSchema {
    fn observe(&mut self, value: &Value) {
        self.messages_sampled += 1;
        if let Value::Object(map) = value {
            for (key, field_value) in map {
                let stats = self.fields.entry(key.clone()).or_default();
                stats.inferred_type = Some(InferredType::of(field_value));
                stats.occurrences += 1;
            }
        }
        // Field occurrence rate is recomputed (not merely incremented) each
        // sample, per spec §4.7 "monotonically recomputed each sample" —
        // the rate itself is a ratio derived at read time from
        // `occurrences / messages_sampled`, never stored directly.
    }

    pub fn confidence(&self) -> f64 {
        confidence_for(self.messages_sampled)
    }

    pub fn occurrence_rate(&self, field: &str) -> f64 {
        match self.fields.get(field) {
            Some(stats) if self.messages_sampled > 0 => stats.occurrences as f64 / self.messages_sampled as f64,
            _ => 0.0,
        }
    }

    fn to_search_document(&self, topic: &str) -> SearchDocument {
        let mut fields: Vec<String> = self.fields.keys().cloned().collect();
        fields.sort();
        SearchDocument { container: "stream_topic".to_string(), name: topic.to_string(), fields }
    }
}

/// Emit cadence (spec §4.7: "every 100 messages").
const EMIT_EVERY: u64 = 100;

pub struct SchemaDiscoverer {
    topics: Mutex<HashMap<(String, String), TopicSchema>>,
}

impl Default for SchemaDiscoverer {
    fn default() -> Self {
        SchemaDiscoverer { topics: Mutex::new(HashMap::new()) }
    }
}

impl SchemaDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw message payload into the discoverer for `(stream_id,
    /// topic)`. Returns `Some(SearchDocument)` exactly every
    /// [`EMIT_EVERY`]th sample, `None` otherwise — non-JSON payloads are
    /// silently skipped ("messages that parse as JSON are fed to the
    /// discoverer", spec §4.7).
    pub fn observe(&self, stream_id: &str, topic: &str, payload: &[u8]) -> Option<SearchDocument> {
        let value: Value = serde_json::from_slice(payload).ok()?;

        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let schema = topics.entry((stream_id.to_string(), topic.to_string())).or_default();
        schema.observe(&value);

        if schema.messages_sampled % EMIT_EVERY == 0 {
            Some(schema.to_search_document(topic))
        } else {
            None
        }
    }

    pub fn snapshot(&self, stream_id: &str, topic: &str) -> Option<TopicSchema> {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(&(stream_id.to_string(), topic.to_string())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_buckets_match_sample_thresholds() {
        assert_eq!(confidence_for(0), 0.1);
        assert_eq!(confidence_for(9), 0.1);
        assert_eq!(confidence_for(10), 0.5);
        assert_eq!(confidence_for(99), 0.5);
        assert_eq!(confidence_for(100), 0.8);
        assert_eq!(confidence_for(999), 0.8);
        assert_eq!(confidence_for(1000), 0.95);
    }

    #[test]
    fn non_json_payload_is_silently_skipped() {
        let discoverer = SchemaDiscoverer::new();
        assert!(discoverer.observe("s1", "orders", b"not json").is_none());
        assert!(discoverer.snapshot("s1", "orders").is_none());
    }

    #[test]
    fn emits_a_search_document_every_hundred_messages() {
        let discoverer = SchemaDiscoverer::new();
        let payload = br#"{"id": 1, "name": "alice"}"#;
        for _ in 0..99 {
            assert!(discoverer.observe("s1", "users", payload).is_none());
        }
        let doc = discoverer.observe("s1", "users", payload).expect("100th sample emits");
        assert_eq!(doc.container, "stream_topic");
        assert_eq!(doc.name, "users");
        assert_eq!(doc.fields, vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn field_occurrence_rate_reflects_sparse_fields() {
        let discoverer = SchemaDiscoverer::new();
        discoverer.observe("s1", "events", br#"{"a": 1, "b": 2}"#);
        discoverer.observe("s1", "events", br#"{"a": 1}"#);
        let schema = discoverer.snapshot("s1", "events").unwrap();
        assert_eq!(schema.messages_sampled, 2);
        assert_eq!(schema.occurrence_rate("a"), 1.0);
        assert_eq!(schema.occurrence_rate("b"), 0.5);
    }

    #[test]
    fn separate_streams_keep_independent_schemas() {
        let discoverer = SchemaDiscoverer::new();
        discoverer.observe("s1", "t", br#"{"x": 1}"#);
        discoverer.observe("s2", "t", br#"{"y": "z"}"#);
        assert_eq!(discoverer.snapshot("s1", "t").unwrap().fields.len(), 1);
        assert_eq!(discoverer.snapshot("s2", "t").unwrap().fields.len(), 1);
    }

    #[test]
    fn inferred_type_labels_match_json_buckets() {
        assert_eq!(InferredType::of(&Value::Bool(true)).as_str(), "boolean");
        assert_eq!(InferredType::of(&Value::from(1)).as_str(), "number");
        assert_eq!(InferredType::of(&Value::from("s")).as_str(), "string");
        assert_eq!(InferredType::of(&Value::Null).as_str(), "null");
    }
}
