//! Page-window hook.
//!
//! A [`Paginator`] listens for `db_find` on one entity type, replaces the
//! pending limit with the window for its page, and counts the unpaged
//! result so callers can render page links.

use super::hooks::MapperHook;
use super::Mapper;
use crate::query::{FindArgs, OrderBy};
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct Paginator {
    entity: String,
    page: u64,
    per_page: u64,
    total: Mutex<Option<u64>>,
}

impl Paginator {
    /// Window `per_page` rows wide on 1-based `page` of `entity`. A zero
    /// page is treated as the first page, a zero width as one row.
    pub fn new(entity: impl Into<String>, page: u64, per_page: u64) -> Self {
        Self {
            entity: entity.into(),
            page: page.max(1),
            per_page: per_page.max(1),
            total: Mutex::new(None),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Rows matching the last paginated find, ignoring the window.
    pub fn total(&self) -> Option<u64> {
        *self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of pages, at least one.
    pub fn pages(&self) -> Option<u64> {
        self.total()
            .map(|total| total.div_ceil(self.per_page).max(1))
    }

    fn matches(&self, mapper: &Mapper) -> bool {
        mapper.name().eq_ignore_ascii_case(&self.entity)
    }
}

impl MapperHook for Paginator {
    fn db_find(&self, mapper: &Mapper, args: &mut FindArgs) {
        if !self.matches(mapper) {
            return;
        }

        let unpaged = FindArgs {
            conditions: args.conditions.clone(),
            order: OrderBy::None,
            offset: None,
            amount: None,
        };
        let total = match mapper.count(&unpaged) {
            Ok(total) => Some(total),
            Err(err) => {
                log::warn!("{}: paginator count failed: {err}", mapper.name());
                None
            }
        };
        *self.total.lock().unwrap_or_else(PoisonError::into_inner) = total;

        args.offset = Some(self.offset());
        args.amount = Some(self.per_page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window() {
        let paginator = Paginator::new("Post", 3, 20);
        assert_eq!(paginator.offset(), 40);
        assert_eq!(paginator.total(), None);

        let first = Paginator::new("Post", 0, 0);
        assert_eq!(first.page(), 1);
        assert_eq!(first.per_page(), 1);
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn test_pages_rounds_up() {
        let paginator = Paginator::new("Post", 1, 10);
        *paginator.total.lock().unwrap() = Some(21);
        assert_eq!(paginator.pages(), Some(3));
        *paginator.total.lock().unwrap() = Some(0);
        assert_eq!(paginator.pages(), Some(1));
    }
}
