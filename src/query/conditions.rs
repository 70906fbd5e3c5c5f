//! Call-scoped find arguments: conditions and ordering.
//!
//! A condition maps a *field expression* to a value or list of values. The
//! expression may carry an operator after the field name:
//!
//! | expression      | rendered                |
//! |-----------------|-------------------------|
//! | `name`          | `a.name = ?`            |
//! | `age >`         | `a.age > ?`             |
//! | `age >=`        | `a.age >= ?`            |
//! | `state !`       | `a.state != ?`          |
//! | `id IN`         | `a.id IN (?, ?, ...)`   |
//! | `id NOT IN`     | `a.id NOT IN (?, ...)`  |
//! | `title LIKE`    | `a.title LIKE ?`        |

use super::error::BuildError;
use crate::value::{Param, Params};
use std::str::FromStr;

/// Filter part of a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Conditions {
    /// No filtering (`"all"` / `"*"`).
    #[default]
    All,
    /// Field expression → value(s), AND-joined.
    Where(Params),
}

impl Conditions {
    pub fn all() -> Self {
        Conditions::All
    }

    /// An empty mapping. Rendering it without adding a clause is an error.
    pub fn new() -> Self {
        Conditions::Where(Params::new())
    }

    /// Add a constraint. Calling this on [`Conditions::All`] starts a mapping.
    #[must_use]
    pub fn with(self, field: impl Into<String>, param: impl Into<Param>) -> Self {
        let mut params = match self {
            Conditions::All => Params::new(),
            Conditions::Where(params) => params,
        };
        params.insert(field, param);
        Conditions::Where(params)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Conditions::All)
    }
}

impl From<Params> for Conditions {
    fn from(params: Params) -> Self {
        Conditions::Where(params)
    }
}

impl FromStr for Conditions {
    type Err = BuildError;

    /// Parses the `all` / `*` markers; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let marker = s.trim();
        if marker == "*" || marker.eq_ignore_ascii_case("all") {
            Ok(Conditions::All)
        } else {
            Err(BuildError::InvalidCondition(format!(
                "'{marker}' is not a condition marker"
            )))
        }
    }
}

/// Comparison carried by a field expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
}

impl Operator {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    pub(crate) fn is_membership(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// Split a field expression into its field name and operator.
pub(crate) fn parse_field_expr(expr: &str) -> Result<(&str, Operator), BuildError> {
    let trimmed = expr.trim();
    let upper = trimmed.to_ascii_uppercase();

    let keyword = [
        (" NOT IN", Operator::NotIn),
        (" IN", Operator::In),
        (" LIKE", Operator::Like),
    ]
    .into_iter()
    .find(|(suffix, _)| upper.ends_with(suffix));

    let (field, op) = if let Some((suffix, op)) = keyword {
        (trimmed[..trimmed.len() - suffix.len()].trim_end(), op)
    } else if let Some(pos) = trimmed.find(['<', '>', '!', '=']) {
        let op = match trimmed[pos..].trim() {
            "=" => Operator::Eq,
            "!" | "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            other => {
                return Err(BuildError::InvalidCondition(format!(
                    "unknown operator '{other}' in '{trimmed}'"
                )))
            }
        };
        (trimmed[..pos].trim_end(), op)
    } else {
        (trimmed, Operator::Eq)
    };

    if !is_identifier(field) {
        return Err(BuildError::InvalidCondition(format!(
            "'{trimmed}' does not name a field"
        )));
    }
    Ok((field, op))
}

/// Plain or single-dot-qualified identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut parts = name.split('.');
    let valid = |p: &str| {
        !p.is_empty()
            && !p.starts_with(|c: char| c.is_ascii_digit())
            && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), None, _) => valid(a),
        (Some(a), Some(b), None) => valid(a) && valid(b),
        _ => false,
    }
}

/// Ordering part of a find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    None,
    /// `"field"` or `"field DIRECTION"`.
    Field(String),
    /// Composite order, one `"field [DIRECTION]"` per entry.
    Fields(Vec<String>),
}

impl OrderBy {
    pub fn is_none(&self) -> bool {
        match self {
            OrderBy::None => true,
            OrderBy::Field(f) => f.trim().is_empty(),
            OrderBy::Fields(fs) => fs.is_empty(),
        }
    }
}

impl From<&str> for OrderBy {
    fn from(s: &str) -> Self {
        OrderBy::from(s.to_string())
    }
}

impl From<String> for OrderBy {
    fn from(s: String) -> Self {
        if s.trim().is_empty() {
            OrderBy::None
        } else {
            OrderBy::Field(s)
        }
    }
}

impl From<Vec<String>> for OrderBy {
    fn from(fields: Vec<String>) -> Self {
        match fields.len() {
            0 => OrderBy::None,
            1 => OrderBy::from(fields.into_iter().next().unwrap_or_default()),
            _ => OrderBy::Fields(fields),
        }
    }
}

impl From<Vec<&str>> for OrderBy {
    fn from(fields: Vec<&str>) -> Self {
        OrderBy::from(fields.into_iter().map(str::to_string).collect::<Vec<_>>())
    }
}

impl<const N: usize> From<[&str; N]> for OrderBy {
    fn from(fields: [&str; N]) -> Self {
        OrderBy::from(Vec::from(fields))
    }
}

impl From<Option<&str>> for OrderBy {
    fn from(field: Option<&str>) -> Self {
        field.map_or(OrderBy::None, OrderBy::from)
    }
}
