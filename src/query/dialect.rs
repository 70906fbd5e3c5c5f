//! SQL dialect differences the builder has to care about.

use serde::Deserialize;

/// Target SQL dialect.
///
/// `MySql` is the native shape of the builder: backtick identifiers,
/// `LIMIT offset, amount` and `LIMIT 1` on single-row writes. `Postgres`
/// switches identifier quoting, pagination syntax and uses `RETURNING` to
/// report the assigned identity of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgresql")]
    Postgres,
}

impl Dialect {
    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for c in ident.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Single-row writes are scoped with `LIMIT 1` where the dialect allows it.
    pub(crate) fn limits_writes(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Inserts report the new identity through `RETURNING`.
    pub(crate) fn returns_identity(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}
