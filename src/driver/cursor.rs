//! Result cursors over driver result sets.
//!
//! A [`ResultCursor`] pulls rows from a [`RowSource`] on demand and buffers
//! every row it has seen, so forward iteration (`row`) and random access
//! (`get`) share one fetch. Once the source reports its end it is dropped;
//! from then on the cursor serves purely from the buffer.

use super::DriverError;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// One returned row: column names shared across the result set, values in
/// column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the first column named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Driver-native row producer behind a cursor.
pub trait RowSource: Send {
    /// Next row, or `None` once the result set is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, DriverError>;

    /// Number of rows not yet returned, when the driver knows it up front.
    fn remaining(&self) -> Option<u64> {
        None
    }
}

impl RowSource for std::vec::IntoIter<Row> {
    fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.next())
    }

    fn remaining(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// Buffered, memoizing cursor returned by [`Driver::execute`](super::Driver::execute).
pub struct ResultCursor {
    source: Option<Box<dyn RowSource>>,
    buffered: Vec<Row>,
    position: usize,
    insert_id: Option<i64>,
    affected_rows: u64,
}

impl ResultCursor {
    pub fn new(source: impl RowSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            buffered: Vec::new(),
            position: 0,
            insert_id: None,
            affected_rows: 0,
        }
    }

    /// Cursor over rows already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(rows.into_iter())
    }

    /// Cursor of a statement that returned no rows.
    pub fn empty() -> Self {
        Self::from_rows(Vec::new())
    }

    #[must_use]
    pub fn with_insert_id(mut self, insert_id: Option<i64>) -> Self {
        self.insert_id = insert_id;
        self
    }

    #[must_use]
    pub fn with_affected_rows(mut self, affected_rows: u64) -> Self {
        self.affected_rows = affected_rows;
        self
    }

    /// Pull from the source until `len` rows are buffered or it runs dry.
    fn fill_to(&mut self, len: usize) -> Result<(), DriverError> {
        while self.buffered.len() < len {
            let Some(source) = self.source.as_mut() else {
                break;
            };
            match source.next_row()? {
                Some(row) => self.buffered.push(row),
                None => self.source = None,
            }
        }
        Ok(())
    }

    /// Advance and return the next row, or `None` at the end.
    pub fn row(&mut self) -> Result<Option<&Row>, DriverError> {
        let index = self.position;
        self.fill_to(index.saturating_add(1))?;
        if index < self.buffered.len() {
            self.position += 1;
        }
        Ok(self.buffered.get(index))
    }

    /// Row at `index`, or `None` past the end. Does not move the position
    /// used by [`row`](Self::row).
    pub fn get(&mut self, index: usize) -> Result<Option<&Row>, DriverError> {
        self.fill_to(index.saturating_add(1))?;
        Ok(self.buffered.get(index))
    }

    /// Buffer every remaining row.
    pub fn fetch_all(&mut self) -> Result<&[Row], DriverError> {
        self.fill_to(usize::MAX)?;
        Ok(&self.buffered)
    }

    /// Restart forward iteration from the first row.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Total rows in the result set. Uses the source's own count when it has
    /// one, otherwise buffers everything.
    pub fn num_rows(&mut self) -> Result<u64, DriverError> {
        if let Some(remaining) = self.source.as_ref().and_then(|s| s.remaining()) {
            return Ok(self.buffered.len() as u64 + remaining);
        }
        Ok(self.fetch_all()?.len() as u64)
    }

    /// `true` once the source has reported its last row.
    pub fn is_exhausted(&self) -> bool {
        self.source.is_none()
    }

    /// Identity assigned by the last insert, if the driver reported one.
    pub fn insert_id(&self) -> Option<i64> {
        self.insert_id
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }
}

impl fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("buffered", &self.buffered.len())
            .field("position", &self.position)
            .field("exhausted", &self.is_exhausted())
            .field("insert_id", &self.insert_id)
            .field("affected_rows", &self.affected_rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source that counts pulls and never reports its size.
    struct Counting {
        rows: std::vec::IntoIter<Row>,
        pulls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl RowSource for Counting {
        fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
            self.pulls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.rows.next())
        }
    }

    fn rows(n: i64) -> Vec<Row> {
        (1..=n).map(|i| Row::from_pairs([("id", i)])).collect()
    }

    #[test]
    fn test_row_iterates_then_ends() {
        let mut cursor = ResultCursor::from_rows(rows(2));
        assert_eq!(cursor.row().unwrap().unwrap().get("id"), Some(&Value::from(1i64)));
        assert_eq!(cursor.row().unwrap().unwrap().get("id"), Some(&Value::from(2i64)));
        assert!(cursor.row().unwrap().is_none());
        assert!(cursor.row().unwrap().is_none());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_random_access_is_memoized() {
        let pulls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut cursor = ResultCursor::new(Counting {
            rows: rows(3).into_iter(),
            pulls: Arc::clone(&pulls),
        });

        assert!(cursor.get(1).unwrap().is_some());
        assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), 2);

        // earlier rows come from the buffer
        assert!(cursor.get(0).unwrap().is_some());
        assert!(cursor.row().unwrap().is_some());
        assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), 2);

        assert_eq!(cursor.num_rows().unwrap(), 3);
        assert!(cursor.get(5).unwrap().is_none());
        assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[test]
    fn test_rewind_replays_buffered_rows() {
        let pulls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut cursor = ResultCursor::new(Counting {
            rows: rows(2).into_iter(),
            pulls: Arc::clone(&pulls),
        });
        while cursor.row().unwrap().is_some() {}
        let pulled = pulls.load(std::sync::atomic::Ordering::SeqCst);

        cursor.rewind();
        assert_eq!(cursor.row().unwrap().unwrap().get("id"), Some(&Value::from(1i64)));
        assert_eq!(cursor.row().unwrap().unwrap().get("id"), Some(&Value::from(2i64)));
        assert!(cursor.row().unwrap().is_none());
        assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), pulled);
    }

    #[test]
    fn test_num_rows_uses_known_size_without_fetching() {
        let mut cursor = ResultCursor::from_rows(rows(4));
        assert_eq!(cursor.num_rows().unwrap(), 4);
        assert!(!cursor.is_exhausted());
    }

    #[test]
    fn test_metadata() {
        let cursor = ResultCursor::empty()
            .with_insert_id(Some(9))
            .with_affected_rows(1);
        assert_eq!(cursor.insert_id(), Some(9));
        assert_eq!(cursor.affected_rows(), 1);
    }
}
