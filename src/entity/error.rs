//! Error types for entity definition and field access.
//!
//! Field-level failures name the offending field, and validation failures
//! also carry the rejected value and the rule it broke.

use std::fmt;

/// Error type for entity operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// A value was rejected by one of the member's rules
    Validation {
        field: String,
        value: String,
        rule: String,
    },
    /// A mandatory member is unset when the entity is about to be written
    MissingField(String),
    /// The name is neither a declared member nor an overflow field
    UnknownField { entity: String, field: String },
    /// The primary key was given a non-integer value
    InvalidIdentity(String),
    /// The entity definition itself is unusable
    Definition(String),
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::Validation { field, value, rule } => write!(
                f,
                "Validation failed for field {field}: value '{value}' does not satisfy {rule}"
            ),
            EntityError::MissingField(field) => {
                write!(f, "Mandatory field {field} is not set")
            }
            EntityError::UnknownField { entity, field } => {
                write!(f, "Entity {entity} has no field {field}")
            }
            EntityError::InvalidIdentity(value) => {
                write!(f, "Identity must be an integer, got '{value}'")
            }
            EntityError::Definition(msg) => write!(f, "Invalid entity definition: {msg}"),
        }
    }
}

impl std::error::Error for EntityError {}
