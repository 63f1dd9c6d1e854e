//! Identifier quoting (spec §4.1, §9): every dynamic identifier an adapter
//! emits into a query string must route through a [`Quoter`]; raw
//! interpolation of a user-supplied table/column name is forbidden.

use conduit_types::IdentifierCasePolicy;

/// One implementation per backend. `quote` both wraps the identifier in the
/// backend's quote character and escapes any occurrence of that character
/// inside the identifier by doubling it, so a hostile or merely
/// apostrophe-laden table name can never break out of the quoted form.
pub trait Quoter: Send + Sync {
    fn quote_char(&self) -> char;
    fn case_policy(&self) -> IdentifierCasePolicy;

    fn quote(&self, ident: &str) -> String {
        let q = self.quote_char();
        let escaped = ident.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Quotes each segment of a dotted path (`schema.table`) independently,
    /// so a literal `.` inside an identifier never gets mistaken for a path
    /// separator.
    fn quote_path(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .map(|s| self.quote(s))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A fixed-quote-character [`Quoter`], sufficient for every backend in this
/// workspace (none needs per-identifier dynamic quote selection).
#[derive(Debug, Clone, Copy)]
pub struct FixedQuoter {
    pub quote_char: char,
    pub case_policy: IdentifierCasePolicy,
}

impl Quoter for FixedQuoter {
    fn quote_char(&self) -> char {
        self.quote_char
    }

    fn case_policy(&self) -> IdentifierCasePolicy {
        self.case_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_embedded_quote_char() {
        let q = FixedQuoter {
            quote_char: '"',
            case_policy: IdentifierCasePolicy::LowercaseUnquoted,
        };
        assert_eq!(q.quote(r#"weird"name"#), r#""weird""name""#);
    }

    #[test]
    fn backtick_quoter_quotes_mysql_style() {
        let q = FixedQuoter {
            quote_char: '`',
            case_policy: IdentifierCasePolicy::PreserveCase,
        };
        assert_eq!(q.quote("orders"), "`orders`");
    }

    #[test]
    fn quote_path_quotes_each_segment() {
        let q = FixedQuoter {
            quote_char: '"',
            case_policy: IdentifierCasePolicy::LowercaseUnquoted,
        };
        assert_eq!(q.quote_path(&["public", "users"]), r#""public"."users""#);
    }
}
