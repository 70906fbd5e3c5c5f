//! Round trip against a live PostgreSQL server.
//!
//! Note: These tests require a running PostgreSQL database. Set
//! TEST_DATABASE_URL and run with `--ignored`.

use std::sync::Arc;
use tidemark::connection::connect_url;
use tidemark::driver::Driver;
use tidemark::entity::{EntityDef, Member, Rule};
use tidemark::mapper::Registry;
use tidemark::query::{Conditions, QueryPart};
use tidemark::value;

fn registry() -> Registry {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let driver = connect_url(&url).expect("Failed to connect to database");

    driver
        .execute(&QueryPart::text("DROP TABLE IF EXISTS tidemark_users"))
        .expect("Failed to drop schema");
    driver
        .execute(&QueryPart::text(
            "CREATE TABLE tidemark_users (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                age BIGINT,
                joined TIMESTAMPTZ,
                balance NUMERIC(10, 2)
            )",
        ))
        .expect("Failed to setup schema");

    let registry = Registry::new(Arc::new(driver));
    registry
        .define(
            EntityDef::builder("User")
                .table("tidemark_users")
                .alias("u")
                .member(Member::new("name").required())
                .member(Member::new("age").rule(Rule::Integer))
                .member(Member::new("joined"))
                .member(Member::new("balance"))
                .build()
                .expect("valid definition"),
        )
        .expect("define user");
    registry
}

#[test]
#[ignore]
fn test_crud_round_trip() {
    let registry = registry();
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set("name", "Ada").unwrap();
    user.set("age", 36i64).unwrap();
    user.set("joined", "2024-01-02T03:04:05Z").unwrap();
    user.set("balance", "12.50").unwrap();
    users.insert(&mut user).expect("Failed to insert");
    let id = user.identity().expect("insert returns the identity");

    user.set("age", 37i64).unwrap();
    assert!(users.update(&mut user).expect("Failed to update"));

    let loaded = users.get(id).unwrap().expect("row exists");
    assert_eq!(loaded.get_str("name").unwrap().as_deref(), Some("Ada"));
    assert_eq!(loaded.get_i64("age").unwrap(), Some(37));
    let joined = loaded.get("joined").unwrap().expect("joined is set");
    assert_eq!(
        value::as_datetime_utc(&joined).map(|d| d.to_rfc3339()).as_deref(),
        Some("2024-01-02T03:04:05+00:00")
    );
    let balance = loaded.get("balance").unwrap().expect("balance is set");
    assert_eq!(value::render(&balance), "12.50");

    let mut found = users
        .filter(Conditions::new().with("age >", 30i64))
        .limit(0, 10)
        .find()
        .unwrap();
    assert_eq!(found.count().unwrap(), 1);

    assert_eq!(users.remove(id).unwrap(), 1);
    assert!(users.get(id).unwrap().is_none());
}
