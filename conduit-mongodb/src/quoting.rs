use conduit_contract::FixedQuoter;
use conduit_types::IdentifierCasePolicy;

/// MongoDB collection/field names never need SQL-style quoting; this
/// quoter exists only so operators that accept a [`conduit_contract::Quoter`]
/// generically (e.g. a future cross-backend sink building log messages)
/// have one to call, matching every other adapter's shape.
pub static MONGODB_QUOTER: FixedQuoter = FixedQuoter {
    quote_char: '"',
    case_policy: IdentifierCasePolicy::PreserveCase,
};
