//! Typed observers of mapper activity.
//!
//! Every method has a no-op default, so a hook implements only the events it
//! cares about. Hooks run synchronously on the calling thread, in
//! subscription order, and cannot veto an operation. `db_find` is the one
//! event allowed to change what happens next: it receives the effective
//! [`FindArgs`] mutably before the statement is rendered.

use super::Mapper;
use crate::entity::Entity;
use crate::query::{FindArgs, QueryPart};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Driver-side measurements handed to [`MapperHook::post_db_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTiming {
    pub elapsed: Duration,
    /// Rows the driver reported as affected (or returned, for reads).
    pub affected_rows: u64,
}

pub trait MapperHook: Send + Sync {
    /// After a point lookup, whether or not it found a row.
    fn db_populate(&self, _mapper: &Mapper, _entity: &Entity) {}

    /// Before a `find` renders its statement.
    fn db_find(&self, _mapper: &Mapper, _args: &mut FindArgs) {}

    /// Before an insert statement is rendered.
    fn db_insert(&self, _mapper: &Mapper, _entity: &Entity) {}

    /// Before an update statement is executed.
    fn db_update(&self, _mapper: &Mapper, _entity: &Entity) {}

    /// Before a delete statement is rendered.
    fn db_remove(&self, _mapper: &Mapper, _identity: i64) {}

    /// After every statement the driver executed successfully.
    fn post_db_query(&self, _mapper: &Mapper, _query: &QueryPart, _timing: &QueryTiming) {}
}

/// Ordered set of subscribed hooks.
#[derive(Default)]
pub struct HookBus {
    hooks: RwLock<Vec<Arc<dyn MapperHook>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, hook: Arc<dyn MapperHook>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current subscribers. Dispatch runs over a snapshot so a hook may call
    /// back into the mapper, or subscribe further hooks, without deadlock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn MapperHook>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn each(&self, mut f: impl FnMut(&dyn MapperHook)) {
        for hook in self.snapshot() {
            f(hook.as_ref());
        }
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus").field("hooks", &self.len()).finish()
    }
}
