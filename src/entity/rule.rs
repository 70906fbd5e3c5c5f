//! Field validation rules.
//!
//! Rules are the boundary to field-level validation: a member carries a
//! list of them and every validated `set` must satisfy all of them. `NULL`
//! satisfies every rule except [`Rule::Required`].

use super::error::EntityError;
use crate::value::{self, Value, ValueKind};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

type Check = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Rule {
    /// Must be set, non-null and not empty text
    Required,
    /// Integer, or text that parses as one
    Integer,
    /// Any number, or text that parses as one
    Numeric,
    Text,
    Boolean,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(Regex),
    OneOf(Vec<String>),
    Custom { name: String, check: Check },
}

impl Rule {
    /// Compile a [`Rule::Pattern`].
    pub fn pattern(pattern: &str) -> Result<Self, EntityError> {
        Regex::new(pattern)
            .map(Rule::Pattern)
            .map_err(|e| EntityError::Definition(format!("invalid pattern '{pattern}': {e}")))
    }

    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::OneOf(choices.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Rule::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Name used in validation errors.
    pub fn name(&self) -> String {
        match self {
            Rule::Required => "required".to_string(),
            Rule::Integer => "integer".to_string(),
            Rule::Numeric => "numeric".to_string(),
            Rule::Text => "text".to_string(),
            Rule::Boolean => "boolean".to_string(),
            Rule::MinLength(n) => format!("min_length({n})"),
            Rule::MaxLength(n) => format!("max_length({n})"),
            Rule::Min(n) => format!("min({n})"),
            Rule::Max(n) => format!("max({n})"),
            Rule::Pattern(re) => format!("pattern({})", re.as_str()),
            Rule::OneOf(choices) => format!("one_of({})", choices.join("|")),
            Rule::Custom { name, .. } => name.clone(),
        }
    }

    pub fn check(&self, value: &Value) -> bool {
        if value::is_null(value) {
            return !matches!(self, Rule::Required);
        }
        match self {
            Rule::Required => value::as_str(value).map_or(true, |s| !s.is_empty()),
            Rule::Integer => value::as_i64(value).is_some(),
            Rule::Numeric => value::as_f64(value).is_some(),
            Rule::Text => value::kind(value) == ValueKind::Text,
            Rule::Boolean => match value::kind(value) {
                ValueKind::Bool => true,
                ValueKind::Integer => matches!(value::as_i64(value), Some(0 | 1)),
                _ => false,
            },
            Rule::MinLength(n) => value::render(value).chars().count() >= *n,
            Rule::MaxLength(n) => value::render(value).chars().count() <= *n,
            Rule::Min(n) => value::as_f64(value).is_some_and(|v| v >= *n),
            Rule::Max(n) => value::as_f64(value).is_some_and(|v| v <= *n),
            Rule::Pattern(re) => re.is_match(&value::render(value)),
            Rule::OneOf(choices) => {
                let rendered = value::render(value);
                choices.iter().any(|c| *c == rendered)
            }
            Rule::Custom { check, .. } => check(value),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule({})", self.name())
    }
}
