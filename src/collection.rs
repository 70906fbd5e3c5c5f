//! Lazy entity collections.
//!
//! A [`Collection`] turns rows into entities on first access and caches
//! them by index. It holds the cursor and the mapper that produced it only
//! until every row has been materialized once (or it is
//! [detached](Collection::detach)); from then on it is a plain in-memory
//! list that no longer refers to the database.

use crate::driver::ResultCursor;
use crate::entity::Entity;
use crate::mapper::{Mapper, MapperError};
use serde::ser::{Error as _, Serialize, SerializeSeq, Serializer};
use std::fmt;

struct Source {
    mapper: Mapper,
    cursor: ResultCursor,
}

pub struct Collection {
    source: Option<Source>,
    cache: Vec<Option<Entity>>,
}

impl Collection {
    pub(crate) fn new(mapper: Mapper, cursor: ResultCursor) -> Self {
        Self {
            source: Some(Source { mapper, cursor }),
            cache: Vec::new(),
        }
    }

    /// Entity at `index`, materializing it on first access. `None` past the
    /// last row.
    ///
    /// # Errors
    ///
    /// `Driver` when fetching the row fails, `Entity` when it does not fit
    /// the entity definition.
    pub fn get(&mut self, index: usize) -> Result<Option<&Entity>, MapperError> {
        let cached = self.cache.get(index).is_some_and(Option::is_some);
        if !cached {
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            let entity = match source.cursor.get(index)? {
                Some(row) => source.mapper.load(row)?,
                None => {
                    self.release_if_complete()?;
                    return Ok(None);
                }
            };
            log::trace!("{}: materialized row {index}", source.mapper.name());

            if self.cache.len() <= index {
                self.cache.resize_with(index + 1, || None);
            }
            self.cache[index] = Some(entity);
            self.release_if_complete()?;
        }
        Ok(self.cache.get(index).and_then(Option::as_ref))
    }

    /// First entity, cloned.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub fn first(&mut self) -> Result<Option<Entity>, MapperError> {
        Ok(self.get(0)?.cloned())
    }

    /// Drop the cursor and mapper once every row has been materialized.
    fn release_if_complete(&mut self) -> Result<(), MapperError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        if !source.cursor.is_exhausted() {
            return Ok(());
        }
        let total = usize::try_from(source.cursor.num_rows()?).unwrap_or(usize::MAX);
        let complete = self.cache.len() >= total && self.cache.iter().all(Option::is_some);
        if complete {
            log::trace!("{}: collection fully materialized", source.mapper.name());
            self.source = None;
        }
        Ok(())
    }

    /// Number of rows. Does not materialize entities.
    ///
    /// # Errors
    ///
    /// `Driver` when the cursor has to fetch to find out.
    pub fn count(&mut self) -> Result<u64, MapperError> {
        match self.source.as_mut() {
            Some(source) => Ok(source.cursor.num_rows()?),
            None => Ok(self.cache.len() as u64),
        }
    }

    /// Materialize every row and release the cursor and mapper.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub fn detach(&mut self) -> Result<(), MapperError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        let total = usize::try_from(source.cursor.num_rows()?).unwrap_or(usize::MAX);
        for index in 0..total {
            self.get(index)?;
        }
        self.source = None;
        self.cache.truncate(total);
        Ok(())
    }

    /// `true` once the collection no longer refers to a cursor.
    pub fn is_detached(&self) -> bool {
        self.source.is_none()
    }

    /// Detach and return the entities in row order.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub fn into_vec(mut self) -> Result<Vec<Entity>, MapperError> {
        self.detach()?;
        Ok(self.cache.into_iter().flatten().collect())
    }

    /// Entities in row order, cloned out of the cache.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            collection: self,
            next: 0,
            failed: false,
        }
    }
}

impl From<Vec<Entity>> for Collection {
    fn from(entities: Vec<Entity>) -> Self {
        Self {
            source: None,
            cache: entities.into_iter().map(Some).collect(),
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("materialized", &self.cache.iter().flatten().count())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Borrowing iterator returned by [`Collection::iter`].
pub struct Iter<'c> {
    collection: &'c mut Collection,
    next: usize,
    failed: bool,
}

impl Iterator for Iter<'_> {
    type Item = Result<Entity, MapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.collection.get(self.next) {
            Ok(Some(entity)) => {
                self.next += 1;
                Some(Ok(entity.clone()))
            }
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Owning iterator over a collection's entities.
pub struct IntoIter {
    collection: Collection,
    next: usize,
    failed: bool,
}

impl Iterator for IntoIter {
    type Item = Result<Entity, MapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.collection.get(self.next) {
            Ok(Some(_)) => {
                let entity = self.collection.cache[self.next].take();
                self.next += 1;
                entity.map(Ok)
            }
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl IntoIterator for Collection {
    type Item = Result<Entity, MapperError>;
    type IntoIter = IntoIter;

    fn into_iter(self) -> IntoIter {
        IntoIter {
            collection: self,
            next: 0,
            failed: false,
        }
    }
}

impl<'c> IntoIterator for &'c mut Collection {
    type Item = Result<Entity, MapperError>;
    type IntoIter = Iter<'c>;

    fn into_iter(self) -> Iter<'c> {
        self.iter()
    }
}

impl Serialize for Collection {
    /// A sequence of entities. Only a detached (or fully visited)
    /// collection can be serialized.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.is_detached() {
            return Err(S::Error::custom(
                "collection must be detached before it can be serialized",
            ));
        }
        let mut seq = serializer.serialize_seq(Some(self.cache.len()))?;
        for entity in self.cache.iter().flatten() {
            seq.serialize_element(entity)?;
        }
        seq.end()
    }
}
