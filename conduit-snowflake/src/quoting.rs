use conduit_contract::FixedQuoter;
use conduit_types::IdentifierCasePolicy;

pub static SNOWFLAKE_QUOTER: FixedQuoter = FixedQuoter {
    quote_char: '"',
    case_policy: IdentifierCasePolicy::UppercaseUnquoted,
};
