//! Error type for statement construction.
//!
//! Every variant is a programmer error in the calling code. They surface
//! immediately and are never retried.

use std::fmt;

/// Error raised while rendering SQL text and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Conditions are neither the `all` marker nor a mapping that
    /// produced at least one clause, or a field expression is malformed
    InvalidCondition(String),
    /// Ordering names an invalid field or direction
    InvalidOrder(String),
    /// `amount` without `offset`
    InvalidLimit,
    /// Template token uses a modifier that does not exist
    InvalidModifier(String),
    /// Template token is malformed or applies a modifier to the wrong shape
    InvalidTemplate(String),
    /// Template references a key absent from the values and the builder context
    MissingValue(String),
    /// Statement requires a primary-key value the entity does not have
    MissingIdentity,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidCondition(s) => write!(f, "Invalid condition: {s}"),
            BuildError::InvalidOrder(s) => write!(f, "Invalid order: {s}"),
            BuildError::InvalidLimit => {
                write!(f, "Invalid limit: an amount requires an offset")
            }
            BuildError::InvalidModifier(s) => write!(f, "Invalid template modifier: {s}"),
            BuildError::InvalidTemplate(s) => write!(f, "Invalid template token: {s}"),
            BuildError::MissingValue(s) => write!(f, "Missing template value: {s}"),
            BuildError::MissingIdentity => {
                write!(f, "Entity has no identity; it has not been persisted")
            }
        }
    }
}

impl std::error::Error for BuildError {}
