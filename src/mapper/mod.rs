//! The data mapper.
//!
//! A [`Mapper`] is the only component that talks to the driver. It owns the
//! [`QueryBuilder`] for one entity type and exposes CRUD, the template
//! escape hatch ([`Mapper::query`]) and the fluent entry points
//! ([`Mapper::filter`], [`Mapper::by`], [`Mapper::limit`]), which return an
//! immutable [`FindQuery`] instead of mutating the mapper. A mapper holds no
//! per-query state, so one instance is safely shared by every caller.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tidemark::driver::{MockDriver, Row};
//! use tidemark::entity::{EntityDef, Member};
//! use tidemark::mapper::Mapper;
//! use tidemark::query::Conditions;
//!
//! let def = EntityDef::builder("User")
//!     .table("users")
//!     .member(Member::new("name").required())
//!     .build()
//!     .unwrap();
//! let driver = Arc::new(MockDriver::new());
//! let users = Mapper::new(def, driver.clone());
//!
//! driver.push_rows(vec![Row::from_pairs([("id", 1i64)])]);
//! let mut found = users
//!     .by("name")
//!     .limit(0, 10)
//!     .find_where(Conditions::new().with("name", "ada"))
//!     .unwrap();
//! assert_eq!(found.count().unwrap(), 1);
//! assert_eq!(
//!     driver.last().unwrap().text,
//!     "SELECT user.* FROM `users` AS user WHERE user.`name` = ? ORDER BY user.`name` LIMIT ?, ?"
//! );
//! ```

pub mod error;
pub mod find;
pub mod hooks;
pub mod paginator;
pub mod registry;

#[doc(inline)]
pub use error::MapperError;
#[doc(inline)]
pub use find::FindQuery;
#[doc(inline)]
pub use hooks::{HookBus, MapperHook, QueryTiming};
#[doc(inline)]
pub use paginator::Paginator;
#[doc(inline)]
pub use registry::Registry;

use crate::collection::Collection;
use crate::driver::{Driver, DriverError, ResultCursor, Row};
use crate::entity::{Entity, EntityDef, EntityError};
use crate::query::{Conditions, FindArgs, OrderBy, QueryBuilder, QueryPart, Target};
use crate::value::{self, Params};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gateway between one entity type and the database.
#[derive(Clone)]
pub struct Mapper {
    def: Arc<EntityDef>,
    builder: Arc<QueryBuilder>,
    driver: Arc<dyn Driver>,
    hooks: Arc<HookBus>,
    slow_query: Option<Duration>,
}

impl Mapper {
    /// Stand-alone mapper with its own, empty hook bus.
    pub fn new(def: Arc<EntityDef>, driver: Arc<dyn Driver>) -> Self {
        Self::with_hooks(def, driver, Arc::new(HookBus::new()))
    }

    /// Mapper dispatching to a shared hook bus.
    pub fn with_hooks(def: Arc<EntityDef>, driver: Arc<dyn Driver>, hooks: Arc<HookBus>) -> Self {
        let builder = Arc::new(QueryBuilder::new(&def, driver.dialect()));
        Self {
            def,
            builder,
            driver,
            hooks,
            slow_query: None,
        }
    }

    /// Copy of this mapper with `hook` added on top of the current
    /// subscribers. The original mapper and its bus are left untouched.
    #[must_use]
    pub fn with_hook(&self, hook: Arc<dyn MapperHook>) -> Self {
        let hooks = HookBus::new();
        for existing in self.hooks.snapshot() {
            hooks.subscribe(existing);
        }
        hooks.subscribe(hook);
        Self {
            hooks: Arc::new(hooks),
            ..self.clone()
        }
    }

    /// Log statements taking at least `threshold` at `warn`.
    #[must_use]
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query = Some(threshold);
        self
    }

    pub fn def(&self) -> &Arc<EntityDef> {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    /// Blank, unsaved entity of this mapper's type.
    pub fn create(&self) -> Entity {
        Entity::new(Arc::clone(&self.def))
    }

    /// Run `args` and wrap the result in a lazy [`Collection`].
    ///
    /// `db_find` hooks see (and may rewrite) the arguments before the
    /// statement is rendered.
    ///
    /// # Errors
    ///
    /// `Build` for malformed conditions, order or limit, `Driver` when execution fails.
    pub fn find(&self, args: impl Into<FindArgs>) -> Result<Collection, MapperError> {
        let mut args = args.into();
        self.hooks.each(|hook| hook.db_find(self, &mut args));
        let part = self.builder.build_find(&args)?;
        let cursor = self.run(&part)?;
        Ok(Collection::new(self.clone(), cursor))
    }

    /// Number of rows `args` matches. Does not notify `db_find`.
    ///
    /// # Errors
    ///
    /// `Build` for malformed conditions, order or limit, `Driver` when
    /// execution fails or the result holds no non-negative count.
    pub fn count(&self, args: &FindArgs) -> Result<u64, MapperError> {
        let part = self.builder.build_count(args)?;
        let mut cursor = self.run(&part)?;
        let row = cursor.row()?.ok_or_else(|| {
            DriverError::Conversion(format!("count on {} returned no row", self.name()))
        })?;
        let count = row
            .values()
            .first()
            .and_then(value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                DriverError::Conversion(format!(
                    "count on {} returned {:?} instead of a row count",
                    self.name(),
                    row.values().first()
                ))
            })?;
        Ok(count)
    }

    /// Start a fluent query with `conditions`.
    pub fn filter(&self, conditions: impl Into<Conditions>) -> FindQuery<'_> {
        FindQuery::new(self).filter(conditions)
    }

    /// Start a fluent query ordered by `order`.
    pub fn by(&self, order: impl Into<OrderBy>) -> FindQuery<'_> {
        FindQuery::new(self).by(order)
    }

    /// Start a fluent query with a limit. See [`QueryBuilder::build_limit`].
    pub fn limit(&self, offset: u64, amount: impl Into<Option<u64>>) -> FindQuery<'_> {
        FindQuery::new(self).limit(offset, amount)
    }

    /// Point lookup: fill `entity` from the row matching its identity (or,
    /// without one, every field currently set). A loaded entity has no dirty
    /// fields.
    ///
    /// No matching row is not an error: the entity is flagged
    /// [erroneous](Entity::is_erroneous) and left as it was.
    ///
    /// # Errors
    ///
    /// `Build` when the entity has neither identity nor fields, `Driver` when
    /// execution fails.
    pub fn populate(&self, entity: &mut Entity) -> Result<(), MapperError> {
        let part = self.builder.build_find_object(entity)?;
        let mut cursor = self.run(&part)?;
        match cursor.row()? {
            Some(row) => {
                self.hydrate(entity, row)?;
                entity.clear_dirty();
                entity.set_erroneous(false);
            }
            None => {
                debug!("{}: point lookup found no row", self.name());
                entity.set_erroneous(true);
            }
        }
        self.hooks.each(|hook| hook.db_populate(self, entity));
        Ok(())
    }

    /// Load the entity with identity `id`, or `None` when no row matches.
    ///
    /// # Errors
    ///
    /// As for [`populate`](Self::populate).
    pub fn get(&self, id: i64) -> Result<Option<Entity>, MapperError> {
        let mut entity = Entity::with_identity(Arc::clone(&self.def), id);
        self.populate(&mut entity)?;
        Ok((!entity.is_erroneous()).then_some(entity))
    }

    /// Copy a row onto `entity` as persisted state: the primary key becomes
    /// the identity, declared members are raw-set, anything else goes to
    /// overflow.
    pub(crate) fn hydrate(&self, entity: &mut Entity, row: &Row) -> Result<(), EntityError> {
        let primary_key = self.def.primary_key();
        for (column, v) in row.iter() {
            if column == primary_key || self.def.member(column).is_some() {
                entity.set_raw(column, v.clone())?;
            } else {
                entity.set_overflow(column, v.clone());
            }
        }
        if let Some(behavior) = self.def.behavior() {
            behavior.after_load(entity);
        }
        Ok(())
    }

    /// Blank entity hydrated from `row`.
    pub(crate) fn load(&self, row: &Row) -> Result<Entity, EntityError> {
        let mut entity = self.create();
        self.hydrate(&mut entity, row)?;
        Ok(entity)
    }

    /// Insert `entity` and adopt the identity the driver assigned.
    ///
    /// # Errors
    ///
    /// `Entity` when a mandatory field is missing, `Driver` when execution
    /// fails.
    pub fn insert(&self, entity: &mut Entity) -> Result<(), MapperError> {
        entity.ensure()?;
        self.hooks.each(|hook| hook.db_insert(self, entity));
        let part = self.builder.build_insert(entity)?;
        let cursor = self.run(&part)?;
        if let Some(id) = cursor.insert_id() {
            entity.set_identity(Some(id));
        }
        entity.clear_dirty();
        Ok(())
    }

    /// Write the dirty fields of `entity`.
    ///
    /// Returns `false` without touching the database when nothing is dirty.
    ///
    /// # Errors
    ///
    /// `Build(MissingIdentity)` for an unsaved entity, `Entity` when a
    /// mandatory field is missing, `Driver` when execution fails.
    pub fn update(&self, entity: &mut Entity) -> Result<bool, MapperError> {
        let Some(part) = self.builder.build_update(entity)? else {
            debug!("{}: nothing to update", self.name());
            return Ok(false);
        };
        entity.ensure()?;
        self.hooks.each(|hook| hook.db_update(self, entity));
        self.run(&part)?;
        entity.clear_dirty();
        Ok(true)
    }

    /// Insert a new entity, update a persisted one.
    ///
    /// # Errors
    ///
    /// As for [`insert`](Self::insert) and [`update`](Self::update).
    pub fn save(&self, entity: &mut Entity) -> Result<(), MapperError> {
        if entity.is_new() {
            self.insert(entity)
        } else {
            self.update(entity).map(|_| ())
        }
    }

    /// Delete one row by identity, or by a persisted entity's identity.
    /// Returns the number of rows the driver reported as deleted.
    ///
    /// # Errors
    ///
    /// `Build(MissingIdentity)` for an unsaved entity, `Driver` when
    /// execution fails.
    pub fn remove<'a>(&self, target: impl Into<Target<'a>>) -> Result<u64, MapperError> {
        let identity = target.into().identity()?;
        self.hooks.each(|hook| hook.db_remove(self, identity));
        let part = self.builder.build_delete(identity)?;
        let cursor = self.run(&part)?;
        Ok(cursor.affected_rows())
    }

    /// Run a hand-written template (see [`QueryBuilder::format`]).
    ///
    /// # Errors
    ///
    /// `Build` for an invalid template, `Driver` when execution fails.
    pub fn query(&self, template: &str, values: &Params) -> Result<Collection, MapperError> {
        let part = self.builder.format(template, values)?;
        let cursor = self.run(&part)?;
        Ok(Collection::new(self.clone(), cursor))
    }

    fn run(&self, part: &QueryPart) -> Result<ResultCursor, MapperError> {
        debug!("{}: {} [{} args]", self.name(), part.text, part.args.len());
        let start = Instant::now();
        let cursor = self
            .driver
            .execute(part)
            .inspect_err(|e| debug!("{}: statement failed: {e}", self.name()))?;
        let elapsed = start.elapsed();

        if self.slow_query.is_some_and(|threshold| elapsed >= threshold) {
            warn!("{}: slow statement ({elapsed:?}): {}", self.name(), part.text);
        }

        let timing = QueryTiming {
            elapsed,
            affected_rows: cursor.affected_rows(),
        };
        self.hooks.each(|hook| hook.post_db_query(self, part, &timing));
        Ok(cursor)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("entity", &self.def.name())
            .field("builder", &self.builder)
            .field("hooks", &self.hooks)
            .finish()
    }
}
