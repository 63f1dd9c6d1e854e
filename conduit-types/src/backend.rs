use std::fmt;

/// The closed set of data systems the fabric fronts.
///
/// Adding a new backend means adding a variant here, an entry in
/// [`CAPABILITIES`], and an adapter crate — nothing in this crate's API is
/// a dynamic registry, because the set of backend kinds is fixed at compile
/// time and exhaustiveness checking on `match BackendKind` is the cheapest
/// guarantee we have that every operator handles every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Postgres,
    MySql,
    Neo4j,
    Snowflake,
    MongoDb,
    Redis,
    ObjectStore,
    Kafka,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
            BackendKind::Neo4j => "neo4j",
            BackendKind::Snowflake => "snowflake",
            BackendKind::MongoDb => "mongodb",
            BackendKind::Redis => "redis",
            BackendKind::ObjectStore => "object_store",
            BackendKind::Kafka => "kafka",
        };
        f.write_str(name)
    }
}

/// How a replication source observes changes on a given backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdcMechanism {
    /// A long-lived subscription to the backend's write-ahead/transaction
    /// log (Postgres logical replication, MySQL binlog).
    LogicalLog,
    /// A native, backend-managed change feed the source consumes as a
    /// regular query (Mongo change streams, a warehouse stream view).
    Streams,
    /// Same idea as `Streams`, kept as a distinct variant because some
    /// backends (warehouses) call the underlying object a "stream" but
    /// expose transaction-log-like ordering guarantees a true streaming
    /// consumer would not have.
    TransactionLog,
    /// In-memory snapshot diffing on a timer. Last resort: O(n) per tick,
    /// loses delete semantics across restarts (see spec §4.2/§9).
    Polling,
    ChangeFeed,
}

/// How a backend treats an unquoted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCasePolicy {
    /// Unquoted identifiers keep whatever case was written (MySQL, Mongo
    /// collection names).
    PreserveCase,
    /// Unquoted identifiers are folded to lowercase (Postgres).
    LowercaseUnquoted,
    /// Unquoted identifiers are folded to uppercase (Snowflake).
    UppercaseUnquoted,
}

/// The declared capability record for one [`BackendKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub supports_cdc: bool,
    pub cdc_mechanism: Option<CdcMechanism>,
    pub supports_transactions: bool,
    pub quote_char: char,
    pub default_port: Option<u16>,
    pub case_policy: IdentifierCasePolicy,
}

/// The canonical capability table. Closed and `const` because the set of
/// backends is closed; see [`BackendKind`].
const CAPABILITIES: [(BackendKind, Capability); 8] = [
    (
        BackendKind::Postgres,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::LogicalLog),
            supports_transactions: true,
            quote_char: '"',
            default_port: Some(5432),
            case_policy: IdentifierCasePolicy::LowercaseUnquoted,
        },
    ),
    (
        BackendKind::MySql,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::LogicalLog),
            supports_transactions: true,
            quote_char: '`',
            default_port: Some(3306),
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
    (
        BackendKind::Neo4j,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::Polling),
            supports_transactions: true,
            quote_char: '`',
            default_port: Some(7687),
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
    (
        BackendKind::Snowflake,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::ChangeFeed),
            supports_transactions: true,
            quote_char: '"',
            default_port: Some(443),
            case_policy: IdentifierCasePolicy::UppercaseUnquoted,
        },
    ),
    (
        BackendKind::MongoDb,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::Streams),
            supports_transactions: false,
            quote_char: '"',
            default_port: Some(27017),
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
    (
        BackendKind::Redis,
        Capability {
            supports_cdc: true,
            cdc_mechanism: Some(CdcMechanism::Polling),
            supports_transactions: false,
            quote_char: '"',
            default_port: Some(6379),
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
    (
        BackendKind::ObjectStore,
        Capability {
            supports_cdc: false,
            cdc_mechanism: None,
            supports_transactions: false,
            quote_char: '"',
            default_port: None,
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
    (
        BackendKind::Kafka,
        Capability {
            supports_cdc: false,
            cdc_mechanism: None,
            supports_transactions: false,
            quote_char: '"',
            default_port: Some(9092),
            case_policy: IdentifierCasePolicy::PreserveCase,
        },
    ),
];

impl BackendKind {
    /// Returns the declared capability record for this backend. Total:
    /// every variant has exactly one entry in [`CAPABILITIES`], enforced by
    /// a unit test below rather than by a runtime lookup failure.
    pub fn capabilities(self) -> Capability {
        CAPABILITIES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, cap)| *cap)
            .expect("CAPABILITIES must have one entry per BackendKind variant")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [BackendKind; 8] = [
        BackendKind::Postgres,
        BackendKind::MySql,
        BackendKind::Neo4j,
        BackendKind::Snowflake,
        BackendKind::MongoDb,
        BackendKind::Redis,
        BackendKind::ObjectStore,
        BackendKind::Kafka,
    ];

    #[test]
    fn every_backend_kind_has_capabilities() {
        for kind in ALL_KINDS {
            let _ = kind.capabilities();
        }
    }

    #[test]
    fn object_store_and_kafka_do_not_claim_cdc() {
        assert!(!BackendKind::ObjectStore.capabilities().supports_cdc);
        assert!(!BackendKind::Kafka.capabilities().supports_cdc);
    }

    #[test]
    fn display_matches_serde_rename() {
        assert_eq!(BackendKind::MongoDb.to_string(), "mongodb");
        assert_eq!(BackendKind::ObjectStore.to_string(), "object_store");
    }
}
