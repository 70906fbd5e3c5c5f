//! Immutable fluent query builder.

use super::{Mapper, MapperError};
use crate::collection::Collection;
use crate::query::{Conditions, FindArgs, OrderBy};

/// Pending `find` arguments bound to a mapper.
///
/// Every chained call returns a new value and leaves the receiver untouched,
/// so a partially built query can be reused or branched freely. `find`
/// consumes the value; `count` only borrows it, so the same filter can be
/// counted and then fetched.
///
/// ```
/// # use std::sync::Arc;
/// # use tidemark::driver::MockDriver;
/// # use tidemark::entity::{EntityDef, Member};
/// # use tidemark::mapper::Mapper;
/// # use tidemark::query::Conditions;
/// # let def = EntityDef::builder("Post").table("posts").alias("p")
/// #     .member(Member::new("author")).build().unwrap();
/// # let posts = Mapper::new(def, Arc::new(MockDriver::new()));
/// let by_ada = posts.filter(Conditions::new().with("author", "ada"));
/// let newest = by_ada.by("id DESC").limit(0, 5);
///
/// assert!(by_ada.args().order.is_none());
/// assert_eq!(newest.args().amount, Some(5));
/// ```
#[derive(Debug, Clone)]
pub struct FindQuery<'m> {
    mapper: &'m Mapper,
    args: FindArgs,
}

impl<'m> FindQuery<'m> {
    pub(crate) fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            args: FindArgs::default(),
        }
    }

    #[must_use]
    pub fn filter(&self, conditions: impl Into<Conditions>) -> Self {
        self.with(|args| args.conditions = conditions.into())
    }

    #[must_use]
    pub fn by(&self, order: impl Into<OrderBy>) -> Self {
        self.with(|args| args.order = order.into())
    }

    #[must_use]
    pub fn limit(&self, offset: u64, amount: impl Into<Option<u64>>) -> Self {
        self.with(|args| {
            args.offset = Some(offset);
            args.amount = amount.into();
        })
    }

    fn with(&self, change: impl FnOnce(&mut FindArgs)) -> Self {
        let mut next = self.clone();
        change(&mut next.args);
        next
    }

    pub fn args(&self) -> &FindArgs {
        &self.args
    }

    pub fn mapper(&self) -> &'m Mapper {
        self.mapper
    }

    /// Execute with the accumulated arguments.
    ///
    /// # Errors
    ///
    /// As for [`Mapper::find`].
    pub fn find(self) -> Result<Collection, MapperError> {
        self.mapper.find(self.args)
    }

    /// Execute with explicit `conditions`, keeping the chained order and
    /// limit.
    ///
    /// # Errors
    ///
    /// As for [`Mapper::find`].
    pub fn find_where(self, conditions: impl Into<Conditions>) -> Result<Collection, MapperError> {
        self.filter(conditions).find()
    }

    /// Count rows matching the accumulated arguments.
    ///
    /// # Errors
    ///
    /// As for [`Mapper::count`].
    pub fn count(&self) -> Result<u64, MapperError> {
        self.mapper.count(&self.args)
    }
}

impl From<FindQuery<'_>> for FindArgs {
    fn from(query: FindQuery<'_>) -> Self {
        query.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use crate::entity::{EntityDef, Member};
    use std::sync::Arc;

    fn mapper() -> (Arc<MockDriver>, Mapper) {
        let def = EntityDef::builder("Post")
            .table("posts")
            .alias("p")
            .member(Member::new("title"))
            .build()
            .unwrap();
        let driver = Arc::new(MockDriver::new());
        (driver.clone(), Mapper::new(def, driver))
    }

    #[test]
    fn test_chain_does_not_mutate_receiver() {
        let (_, posts) = mapper();
        let base = posts.by("title");
        let limited = base.limit(10, 5);
        assert_eq!(base.args().offset, None);
        assert_eq!(limited.args().offset, Some(10));
        assert_eq!(limited.args().order, OrderBy::from("title"));
    }

    #[test]
    fn test_chained_state_does_not_leak_into_next_find() {
        let (driver, posts) = mapper();
        posts
            .by("id")
            .limit(0, 10)
            .find_where(Conditions::all())
            .unwrap();
        posts.find(Conditions::all()).unwrap();

        let executed = driver.executed();
        assert_eq!(
            executed[0].text,
            "SELECT p.* FROM `posts` AS p ORDER BY p.`id` LIMIT ?, ?"
        );
        assert_eq!(executed[1].text, "SELECT p.* FROM `posts` AS p");
        assert!(executed[1].args.is_empty());
    }

    #[test]
    fn test_count_then_find_same_filter() {
        let (driver, posts) = mapper();
        let query = posts.filter(Conditions::new().with("title", "a"));
        driver.push_rows(vec![crate::driver::Row::from_pairs([("count", 2i64)])]);
        assert_eq!(query.count().unwrap(), 2);
        query.find().unwrap();
        let executed = driver.executed();
        assert_eq!(
            executed[0].text,
            "SELECT COUNT(*) FROM `posts` AS p WHERE p.`title` = ?"
        );
        assert_eq!(
            executed[1].text,
            "SELECT p.* FROM `posts` AS p WHERE p.`title` = ?"
        );
    }
}
