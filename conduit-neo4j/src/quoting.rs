use conduit_contract::FixedQuoter;
use conduit_types::IdentifierCasePolicy;

/// Backtick quoting for Cypher label/property identifiers — Neo4j shares
/// MySQL's escaping rule (double an embedded backtick) even though it is
/// not relational.
pub static NEO4J_QUOTER: FixedQuoter = FixedQuoter {
    quote_char: '`',
    case_policy: IdentifierCasePolicy::PreserveCase,
};
