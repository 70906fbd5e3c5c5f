//! Template substitution for hand-written queries.
//!
//! A template is SQL text with `%(expr)` tokens. `expr` is a key, `?`
//! (the next value in insertion order), or a quoted literal, optionally
//! followed by `|modifier` or preceded by `modifier->`:
//!
//! - `quote`, `safe`, `string`: bind the value, emit `?`
//! - `value`: like `quote`, but a list binds every element and emits `?, ?, ...`
//! - `field`: emit the alias-qualified quoted field name, bind nothing
//! - `this`: emit the builder's own attribute (`table`, `alias`, `primary_key`, `entity`)
//!
//! Without a modifier, caller values are bound and builder context keys are
//! emitted as text.

use super::builder::{placeholders, QueryBuilder};
use super::conditions::is_identifier;
use super::error::BuildError;
use super::part::QueryPart;
use crate::value::{self, Param, Params, Value};
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\(([^()]*)\)").expect("template token pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Quote,
    Value,
    Field,
    This,
}

impl Modifier {
    fn parse(name: &str) -> Result<Self, BuildError> {
        match name {
            "quote" | "safe" | "string" => Ok(Modifier::Quote),
            "value" => Ok(Modifier::Value),
            "field" => Ok(Modifier::Field),
            "this" => Ok(Modifier::This),
            other => Err(BuildError::InvalidModifier(other.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Key<'t> {
    Named(&'t str),
    Positional,
    Literal(&'t str),
}

#[derive(Debug, PartialEq, Eq)]
struct Token<'t> {
    key: Key<'t>,
    modifier: Option<Modifier>,
}

fn parse_key(raw: &str) -> Result<Key<'_>, BuildError> {
    let raw = raw.trim();
    if raw == "?" {
        return Ok(Key::Positional);
    }
    if let Some(quote) = raw.chars().next().filter(|c| *c == '\'' || *c == '"') {
        return match raw[1..].strip_suffix(quote) {
            Some(literal) if raw.len() >= 2 => Ok(Key::Literal(literal)),
            _ => Err(BuildError::InvalidTemplate(raw.to_string())),
        };
    }
    if raw.is_empty() {
        return Err(BuildError::InvalidTemplate("empty token".to_string()));
    }
    Ok(Key::Named(raw))
}

fn parse_token(expr: &str) -> Result<Token<'_>, BuildError> {
    let expr = expr.trim();

    // literal first, so quoted text may contain `|` or `->`
    if expr.starts_with(['\'', '"']) {
        let quote = &expr[..1];
        let close = expr[1..]
            .find(quote)
            .map(|i| i + 1)
            .ok_or_else(|| BuildError::InvalidTemplate(expr.to_string()))?;
        let key = parse_key(&expr[..=close])?;
        let rest = expr[close + 1..].trim();
        let modifier = match rest.strip_prefix('|') {
            Some(m) => Some(Modifier::parse(m.trim())?),
            None if rest.is_empty() => None,
            None => return Err(BuildError::InvalidTemplate(expr.to_string())),
        };
        return Ok(Token { key, modifier });
    }

    if let Some((modifier, key)) = expr.split_once("->") {
        return Ok(Token {
            key: parse_key(key)?,
            modifier: Some(Modifier::parse(modifier.trim())?),
        });
    }
    if let Some((key, modifier)) = expr.rsplit_once('|') {
        return Ok(Token {
            key: parse_key(key)?,
            modifier: Some(Modifier::parse(modifier.trim())?),
        });
    }
    Ok(Token {
        key: parse_key(expr)?,
        modifier: None,
    })
}

/// What a token key resolved to.
enum Resolved<'a> {
    Param(&'a Param),
    Text(String),
}

struct Renderer<'a> {
    builder: &'a QueryBuilder,
    values: &'a Params,
    next_positional: usize,
    args: Vec<Value>,
}

impl<'a> Renderer<'a> {
    fn resolve(&mut self, key: &Key<'_>, modifier: Option<Modifier>) -> Result<Resolved<'a>, BuildError> {
        let values = self.values;
        match key {
            Key::Literal(text) => Ok(Resolved::Text((*text).to_string())),
            Key::Positional => {
                let index = self.next_positional;
                self.next_positional += 1;
                values
                    .entry_at(index)
                    .map(|(_, p)| Resolved::Param(p))
                    .ok_or_else(|| BuildError::MissingValue(format!("positional value #{}", index + 1)))
            }
            Key::Named(name) if modifier == Some(Modifier::This) => self
                .builder
                .context(name)
                .map(|s| Resolved::Text(s.to_string()))
                .ok_or_else(|| BuildError::MissingValue(format!("builder attribute '{name}'"))),
            Key::Named(name) => match values.get(name) {
                Some(param) => Ok(Resolved::Param(param)),
                None => self
                    .builder
                    .context(name)
                    .map(|s| Resolved::Text(s.to_string()))
                    .ok_or_else(|| BuildError::MissingValue((*name).to_string())),
            },
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.args.push(value);
        "?".to_string()
    }

    fn bind_all(&mut self, values: &[Value]) -> String {
        // `IN ()` is not valid SQL; `IN (NULL)` matches nothing
        if values.is_empty() {
            return "NULL".to_string();
        }
        self.args.extend(values.iter().cloned());
        placeholders(values.len())
    }

    fn field(&self, name: &str) -> Result<String, BuildError> {
        if !is_identifier(name) {
            return Err(BuildError::InvalidTemplate(format!("'{name}' does not name a field")));
        }
        Ok(self.builder.field(name))
    }

    fn render(&mut self, token: &Token<'_>) -> Result<String, BuildError> {
        let resolved = self.resolve(&token.key, token.modifier)?;
        match (token.modifier, resolved) {
            (None | Some(Modifier::This), Resolved::Text(text)) => Ok(text),
            (None | Some(Modifier::Value), Resolved::Param(param)) => Ok(self.bind_all(param.values())),
            (Some(Modifier::Quote | Modifier::Value), Resolved::Text(text)) => {
                Ok(self.bind(Value::from(text)))
            }
            (Some(Modifier::Quote), Resolved::Param(Param::One(v))) => Ok(self.bind(v.clone())),
            (Some(Modifier::Quote), Resolved::Param(Param::Many(_))) => Err(
                BuildError::InvalidTemplate("a list value needs the 'value' modifier".to_string()),
            ),
            (Some(Modifier::Field), Resolved::Text(text)) => self.field(&text),
            (Some(Modifier::Field), Resolved::Param(param)) => {
                let mut fields = Vec::new();
                for v in param.values() {
                    let name = value::as_str(v).ok_or_else(|| {
                        BuildError::InvalidTemplate(format!(
                            "field name must be text, got {}",
                            value::render(v)
                        ))
                    })?;
                    fields.push(self.field(name)?);
                }
                Ok(fields.join(", "))
            }
            // `this` always resolves to builder text
            (Some(Modifier::This), Resolved::Param(_)) => {
                Err(BuildError::InvalidTemplate("'this' resolved to a caller value".to_string()))
            }
        }
    }
}

impl QueryBuilder {
    /// Substitute `%(expr)` tokens in `template`.
    ///
    /// Returns the rendered text with the values bound in substitution order.
    ///
    /// # Errors
    ///
    /// `InvalidModifier` for an unknown modifier, `MissingValue` for a key
    /// found neither in `values` nor in the builder context, `InvalidTemplate`
    /// for malformed tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidemark::query::{Dialect, QueryBuilder};
    /// use tidemark::value::{Params, Value};
    ///
    /// let builder = QueryBuilder::for_table("users", "u", "id", Dialect::MySql);
    /// let part = builder
    ///     .format(
    ///         "SELECT * FROM %(table) WHERE %(f|field) = %(v|quote)",
    ///         &Params::new().with("f", "name").with("v", "bob"),
    ///     )
    ///     .unwrap();
    /// assert_eq!(part.text, "SELECT * FROM users WHERE u.`name` = ?");
    /// assert_eq!(part.args, vec![Value::from("bob")]);
    /// ```
    pub fn format(&self, template: &str, values: &Params) -> Result<QueryPart, BuildError> {
        let mut renderer = Renderer {
            builder: self,
            values,
            next_positional: 0,
            args: Vec::new(),
        };

        let mut text = String::with_capacity(template.len());
        let mut last = 0;
        for captures in TOKEN.captures_iter(template) {
            let (Some(whole), Some(expr)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            text.push_str(&template[last..whole.start()]);
            let token = parse_token(expr.as_str())?;
            text.push_str(&renderer.render(&token)?);
            last = whole.end();
        }
        text.push_str(&template[last..]);

        Ok(QueryPart::new(text, renderer.args))
    }
}
