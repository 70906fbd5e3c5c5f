//! `QueryPart`: a fragment of SQL text plus its positional arguments.

use crate::value::Value;
use std::fmt;

/// SQL text with `?` placeholders and the values bound to them, in order.
///
/// Parts compose by concatenating text (space separated) and arguments,
/// so the n-th placeholder in the text always corresponds to `args[n]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPart {
    pub text: String,
    pub args: Vec<Value>,
}

impl QueryPart {
    pub fn new(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            args,
        }
    }

    /// A part with no bound arguments.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.args.is_empty()
    }

    /// Append `other`, separating non-empty text with a single space.
    pub fn append(&mut self, other: QueryPart) {
        if !other.text.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(&other.text);
        }
        self.args.extend(other.args);
    }

    /// Builder-style [`append`](Self::append).
    #[must_use]
    pub fn then(mut self, other: QueryPart) -> Self {
        self.append(other);
        self
    }

    /// Number of `?` placeholders outside quoted literals.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        scan_placeholders(&self.text, |_| count += 1);
        count
    }
}

impl fmt::Display for QueryPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Call `on_placeholder` with the byte offset of every `?` that sits outside
/// single quotes, double quotes and backticks.
pub(crate) fn scan_placeholders(text: &str, mut on_placeholder: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => on_placeholder(i),
                _ => {}
            },
        }
    }
}
