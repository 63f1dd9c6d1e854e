use conduit_contract::FixedQuoter;
use conduit_types::IdentifierCasePolicy;

/// Redis keys need no SQL-style escaping, but every other adapter in this
/// workspace routes identifiers through a [`conduit_contract::Quoter`], so
/// this one does too — `quote` is a no-op wrapper kept for interface
/// uniformity rather than any actual injection risk (Redis commands are
/// never built by string concatenation here, only by the typed `redis::Cmd`
/// builder).
pub static REDIS_QUOTER: FixedQuoter = FixedQuoter {
    quote_char: '"',
    case_policy: IdentifierCasePolicy::PreserveCase,
};
