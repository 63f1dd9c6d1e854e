use conduit_contract::FixedQuoter;
use conduit_types::IdentifierCasePolicy;

/// Table names here are filesystem/object-key path segments, which are
/// case-sensitive everywhere object storage runs; the quote char exists
/// only for interpolating a table name into a generated SQL string when
/// registering it with the query engine.
pub static OBJECTSTORE_QUOTER: FixedQuoter = FixedQuoter {
    quote_char: '"',
    case_policy: IdentifierCasePolicy::PreserveCase,
};
