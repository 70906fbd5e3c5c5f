//! In-memory scripted driver.
//!
//! `MockDriver` records every statement it is asked to execute and answers
//! from a FIFO of scripted responses. When the script runs dry it answers
//! with an empty result. It is always compiled so downstream crates can test
//! their own mappers without a database.

use super::cursor::{ResultCursor, Row};
use super::{Driver, DriverError};
use crate::query::{Dialect, QueryPart};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Response {
    rows: Vec<Row>,
    insert_id: Option<i64>,
    affected_rows: u64,
}

/// Scripted driver that captures executed statements for verification.
///
/// # Examples
///
/// ```
/// use tidemark::driver::{Driver, MockDriver, Row};
/// use tidemark::query::QueryPart;
///
/// let driver = MockDriver::new();
/// driver.push_rows(vec![Row::from_pairs([("id", 1i64)])]);
///
/// let mut cursor = driver.execute(&QueryPart::text("SELECT 1")).unwrap();
/// assert_eq!(cursor.num_rows().unwrap(), 1);
/// assert_eq!(driver.executed()[0].text, "SELECT 1");
/// ```
#[derive(Debug, Default)]
pub struct MockDriver {
    dialect: Dialect,
    script: Mutex<VecDeque<Result<Response, DriverError>>>,
    executed: Mutex<Vec<QueryPart>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    fn push(&self, response: Result<Response, DriverError>) {
        lock(&self.script).push_back(response);
    }

    /// Answer the next statement with `rows`.
    pub fn push_rows(&self, rows: Vec<Row>) {
        let affected_rows = rows.len() as u64;
        self.push(Ok(Response {
            rows,
            insert_id: None,
            affected_rows,
        }));
    }

    /// Answer the next statement as an insert that assigned `id`.
    pub fn push_insert(&self, id: i64) {
        self.push(Ok(Response {
            rows: Vec::new(),
            insert_id: Some(id),
            affected_rows: 1,
        }));
    }

    /// Answer the next statement as a write touching `n` rows.
    pub fn push_affected(&self, n: u64) {
        self.push(Ok(Response {
            rows: Vec::new(),
            insert_id: None,
            affected_rows: n,
        }));
    }

    /// Fail the next statement with `error`.
    pub fn push_error(&self, error: DriverError) {
        self.push(Err(error));
    }

    /// Every statement executed so far, oldest first.
    pub fn executed(&self) -> Vec<QueryPart> {
        lock(&self.executed).clone()
    }

    pub fn last(&self) -> Option<QueryPart> {
        lock(&self.executed).last().cloned()
    }

    /// Forget captured statements and any unconsumed script.
    pub fn clear(&self) {
        lock(&self.executed).clear();
        lock(&self.script).clear();
    }
}

impl Driver for MockDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&self, part: &QueryPart) -> Result<ResultCursor, DriverError> {
        lock(&self.executed).push(part.clone());
        match lock(&self.script).pop_front() {
            Some(Ok(response)) => Ok(ResultCursor::from_rows(response.rows)
                .with_insert_id(response.insert_id)
                .with_affected_rows(response.affected_rows)),
            Some(Err(err)) => Err(err),
            None => Ok(ResultCursor::empty()),
        }
    }
}
