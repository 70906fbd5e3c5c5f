//! Database drivers.
//!
//! A [`Driver`] executes one rendered [`QueryPart`] and hands back a
//! [`ResultCursor`]. Binding is the driver's job: arguments arrive as typed
//! values and are never spliced into the statement text.
//!
//! Two implementations ship with the crate: [`PostgresDriver`] over
//! `may_postgres`, and [`MockDriver`], an in-memory scripted driver that
//! records every statement it is asked to run.

pub mod cursor;
pub mod mock;
pub mod postgres;

#[doc(inline)]
pub use cursor::{ResultCursor, Row, RowSource};
#[doc(inline)]
pub use mock::MockDriver;
#[doc(inline)]
pub use postgres::PostgresDriver;

use crate::query::{Dialect, QueryPart};
use std::fmt;

/// Driver error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The connection could not be established or was lost
    Connection(String),
    /// The server rejected the statement
    Statement { message: String, sql: String },
    /// A bound argument or a returned column could not be converted
    Conversion(String),
}

impl DriverError {
    pub fn statement(message: impl Into<String>, sql: impl Into<String>) -> Self {
        DriverError::Statement {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Rendered SQL of the failed statement, when known.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DriverError::Statement { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Connection(msg) => write!(f, "Connection error: {msg}"),
            DriverError::Statement { message, sql } => {
                write!(f, "Statement failed: {message} (SQL: {sql})")
            }
            DriverError::Conversion(msg) => write!(f, "Conversion error: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Executes rendered statements.
///
/// Implementations must be shareable: one driver backs every mapper of a
/// [`Registry`](crate::mapper::Registry).
pub trait Driver: Send + Sync {
    /// SQL flavour the query builder must render for this driver.
    fn dialect(&self) -> Dialect;

    /// Bind `part.args` to the placeholders in `part.text` and run it.
    ///
    /// # Errors
    ///
    /// `DriverError::Statement` when the server rejects the statement,
    /// `DriverError::Connection` when it cannot be reached, and
    /// `DriverError::Conversion` when an argument cannot be bound.
    fn execute(&self, part: &QueryPart) -> Result<ResultCursor, DriverError>;
}
