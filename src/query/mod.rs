//! SQL text and argument generation.
//!
//! Everything in this module is pure computation: a [`QueryBuilder`] turns
//! condition, order and limit arguments, entity field state, or a template
//! into a [`QueryPart`] (`?`-placeholder text plus ordered arguments).
//!
//! # Examples
//!
//! ```
//! use tidemark::query::{Conditions, Dialect, FindArgs, OrderBy, QueryBuilder};
//!
//! let builder = QueryBuilder::for_table("users", "u", "id", Dialect::MySql);
//! let part = builder
//!     .build_find(&FindArgs {
//!         conditions: Conditions::new().with("age >", 18i64),
//!         order: OrderBy::from("name"),
//!         offset: Some(10),
//!         amount: None,
//!     })
//!     .unwrap();
//! assert_eq!(
//!     part.text,
//!     "SELECT u.* FROM `users` AS u WHERE u.`age` > ? ORDER BY u.`name` LIMIT ?"
//! );
//! assert_eq!(part.args.len(), 2);
//! ```

pub mod builder;
pub mod conditions;
pub mod dialect;
pub mod error;
pub mod part;
pub mod template;

#[doc(inline)]
pub use builder::{FindArgs, QueryBuilder, Target};
#[doc(inline)]
pub use conditions::{Conditions, OrderBy};
#[doc(inline)]
pub use dialect::Dialect;
#[doc(inline)]
pub use error::BuildError;
#[doc(inline)]
pub use part::QueryPart;
