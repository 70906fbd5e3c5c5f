//! # Tidemark
//!
//! Data-mapper persistence for PostgreSQL (and MySQL-flavoured SQL
//! rendering): a pure query builder, validated entities with dirty
//! tracking, lazily materialized result collections and per-type mappers
//! that tie them to a database driver.
//!
//! ```
//! use std::sync::Arc;
//! use tidemark::driver::MockDriver;
//! use tidemark::entity::{EntityDef, Member, Rule};
//! use tidemark::mapper::Registry;
//!
//! let driver = Arc::new(MockDriver::new());
//! let registry = Registry::new(driver.clone());
//! registry
//!     .define(
//!         EntityDef::builder("User")
//!             .table("users")
//!             .alias("u")
//!             .member(Member::new("name").required())
//!             .member(Member::new("age").rule(Rule::Integer))
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let users = registry.mapper("user").unwrap();
//! let mut ada = users.create();
//! ada.set("name", "ada").unwrap();
//! ada.set("age", 36i64).unwrap();
//!
//! driver.push_insert(1);
//! users.insert(&mut ada).unwrap();
//! assert_eq!(ada.identity(), Some(1));
//!
//! ada.set("name", "Ada").unwrap();
//! users.update(&mut ada).unwrap();
//! assert_eq!(
//!     driver.last().unwrap().text,
//!     "UPDATE `users` AS u SET `name` = ? WHERE u.`id` = ? LIMIT 1"
//! );
//! ```

pub mod collection;
pub mod config;
pub mod connection;
pub mod driver;
pub mod entity;
pub mod mapper;
pub mod metrics;
pub mod query;
pub mod value;

pub use collection::Collection;
pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use driver::{Driver, DriverError, MockDriver, PostgresDriver, ResultCursor, Row};
pub use entity::{Entity, EntityDef, EntityError, Member, Rule};
pub use mapper::{FindQuery, Mapper, MapperError, MapperHook, Paginator, Registry};
pub use query::{BuildError, Conditions, Dialect, FindArgs, OrderBy, QueryBuilder, QueryPart};
pub use value::{Param, Params, Value};
