//! Mapper CRUD against the scripted driver.
//!
//! Every test here runs without a database: `MockDriver` captures each
//! statement and answers from a queue, so the assertions are on the exact
//! SQL the mapper sends.

use std::sync::{Arc, Mutex};
use tidemark::driver::{MockDriver, Row};
use tidemark::entity::{Entity, EntityBehavior, EntityDef, EntityError, Member, Rule};
use tidemark::mapper::{Mapper, MapperError, MapperHook, Paginator, QueryTiming, Registry};
use tidemark::query::{BuildError, Conditions, Dialect, FindArgs, QueryPart};
use tidemark::value::{Params, Value};

fn user_def() -> Arc<EntityDef> {
    EntityDef::builder("User")
        .table("users")
        .alias("u")
        .member(Member::new("name").required())
        .member(Member::new("age").rule(Rule::Integer))
        .build()
        .expect("valid definition")
}

fn setup(dialect: Dialect) -> (Arc<MockDriver>, Registry) {
    let driver = Arc::new(MockDriver::with_dialect(dialect));
    let registry = Registry::new(driver.clone());
    registry.define(user_def()).expect("define user");
    (driver, registry)
}

#[test]
fn test_insert_then_update_touches_only_dirty_fields() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set("name", "a").unwrap();
    user.set("age", 3i64).unwrap();
    driver.push_insert(7);
    users.insert(&mut user).unwrap();

    let insert = driver.last().unwrap();
    assert_eq!(insert.text, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");
    assert_eq!(insert.args, vec![Value::from("a"), Value::from(3i64)]);
    assert_eq!(user.identity(), Some(7));
    assert!(user.dirty_fields().is_empty());

    user.set("name", "b").unwrap();
    assert!(users.update(&mut user).unwrap());

    let update = driver.last().unwrap();
    assert_eq!(
        update.text,
        "UPDATE `users` AS u SET `name` = ? WHERE u.`id` = ? LIMIT 1"
    );
    assert_eq!(update.args, vec![Value::from("b"), Value::from(7i64)]);
}

#[test]
fn test_update_with_nothing_dirty_runs_no_statement() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("User").unwrap();

    let mut user = users.create();
    user.set_identity(Some(4));
    user.set_raw("name", "loaded").unwrap();

    assert!(!users.update(&mut user).unwrap());
    assert!(driver.executed().is_empty());
}

#[test]
fn test_save_dispatches_on_identity() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set("name", "new").unwrap();
    driver.push_insert(1);
    users.save(&mut user).unwrap();
    assert!(driver.last().unwrap().text.starts_with("INSERT INTO"));

    user.set("age", 40i64).unwrap();
    users.save(&mut user).unwrap();
    assert!(driver.last().unwrap().text.starts_with("UPDATE"));
    assert_eq!(driver.executed().len(), 2);
}

#[test]
fn test_validation_failure_leaves_entity_untouched() {
    let (_, registry) = setup(Dialect::MySql);
    let mut user = registry.entity("user").unwrap();

    let err = user.set("age", "old").unwrap_err();
    assert_eq!(
        err,
        EntityError::Validation {
            field: "age".to_string(),
            value: "old".to_string(),
            rule: "integer".to_string(),
        }
    );
    assert!(!user.is_set("age"));
    assert!(!user.is_dirty("age"));
}

#[test]
fn test_raw_values_are_never_dirty() {
    let (_, registry) = setup(Dialect::MySql);
    let mut user = registry.entity("user").unwrap();
    user.set_raw("name", "x").unwrap();
    user.set_raw("age", 9i64).unwrap();

    assert_eq!(user.get_str("name").unwrap().as_deref(), Some("x"));
    assert_eq!(user.get_i64("age").unwrap(), Some(9));
    assert!(user.dirty_fields().is_empty());
}

#[test]
fn test_populate_not_found_marks_entity_erroneous() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();
    driver.push_rows(Vec::new());

    let mut ghost = users.create();
    ghost.set_identity(Some(99));
    users.populate(&mut ghost).unwrap();

    assert!(ghost.is_erroneous());
    assert_eq!(
        driver.last().unwrap().text,
        "SELECT u.* FROM `users` AS u WHERE u.`id` = ? LIMIT 1"
    );
    assert!(users.get(99).unwrap().is_none());
}

#[test]
fn test_populate_by_field_values() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();
    driver.push_rows(vec![Row::from_pairs([
        ("id", Value::from(5i64)),
        ("name", Value::from("ada")),
        ("age", Value::from(36i64)),
    ])]);

    let mut lookup = users.create();
    lookup.set("name", "ada").unwrap();
    users.populate(&mut lookup).unwrap();

    assert_eq!(
        driver.last().unwrap().text,
        "SELECT u.* FROM `users` AS u WHERE u.`name` = ?"
    );
    assert!(!lookup.is_erroneous());
    assert!(lookup.dirty_fields().is_empty());
    assert_eq!(lookup.identity(), Some(5));
    assert_eq!(lookup.get_i64("age").unwrap(), Some(36));
}

#[test]
fn test_fluent_state_does_not_leak_between_queries() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();

    let adults = users.filter(Conditions::new().with("age >=", 18i64));
    adults.by("name DESC").limit(20, 10).find().unwrap();
    adults.find().unwrap();
    users.find(Conditions::all()).unwrap();

    let executed = driver.executed();
    assert_eq!(
        executed[0].text,
        "SELECT u.* FROM `users` AS u WHERE u.`age` >= ? ORDER BY u.`name` DESC LIMIT ?, ?"
    );
    assert_eq!(
        executed[0].args,
        vec![Value::from(18i64), Value::from(20u64), Value::from(10u64)]
    );
    assert_eq!(executed[1].text, "SELECT u.* FROM `users` AS u WHERE u.`age` >= ?");
    assert_eq!(executed[2].text, "SELECT u.* FROM `users` AS u");
}

#[test]
fn test_find_materializes_lazily() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();
    driver.push_rows(
        (1..=3i64)
            .map(|i| {
                Row::from_pairs([
                    ("id", Value::from(i)),
                    ("name", Value::from(format!("user{i}"))),
                ])
            })
            .collect(),
    );

    let mut found = users.find(Conditions::all()).unwrap();
    assert_eq!(found.count().unwrap(), 3);
    assert!(!found.is_detached());

    let names: Vec<String> = found
        .iter()
        .map(|user| user.unwrap().get_str("name").unwrap().unwrap())
        .collect();
    assert_eq!(names, vec!["user1", "user2", "user3"]);
    assert!(found.is_detached());
}

#[test]
fn test_remove_by_entity_and_by_identity() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set_identity(Some(8));
    driver.push_affected(1);
    assert_eq!(users.remove(&user).unwrap(), 1);
    assert_eq!(
        driver.last().unwrap().text,
        "DELETE FROM `users` WHERE `id` = ? LIMIT 1"
    );
    assert_eq!(driver.last().unwrap().args, vec![Value::from(8i64)]);

    driver.push_affected(0);
    assert_eq!(users.remove(9i64).unwrap(), 0);

    let unsaved = users.create();
    assert_eq!(
        users.remove(&unsaved).unwrap_err(),
        MapperError::Build(BuildError::MissingIdentity)
    );
}

#[test]
fn test_query_template_binds_caller_values() {
    let (driver, registry) = setup(Dialect::MySql);
    let users = registry.mapper("user").unwrap();
    driver.push_rows(vec![Row::from_pairs([("id", 2i64)])]);

    let mut result = users
        .query(
            "SELECT * FROM %(table) AS %(alias) WHERE %('age'|field) IN (%(ages|value))",
            &Params::new().with("ages", vec![30i64, 40]),
        )
        .unwrap();

    let sent = driver.last().unwrap();
    assert_eq!(sent.text, "SELECT * FROM users AS u WHERE u.`age` IN (?, ?)");
    assert_eq!(sent.args, vec![Value::from(30i64), Value::from(40i64)]);
    assert_eq!(result.first().unwrap().unwrap().identity(), Some(2));
}

#[test]
fn test_paginator_counts_then_windows_find() {
    let (driver, registry) = setup(Dialect::MySql);
    let paginator = Arc::new(Paginator::new("user", 2, 10));
    registry.subscribe(paginator.clone());
    let users = registry.mapper("user").unwrap();

    driver.push_rows(vec![Row::from_pairs([("COUNT(*)", 25i64)])]);
    users
        .by("name")
        .find_where(Conditions::new().with("age >", 20i64))
        .unwrap();

    let executed = driver.executed();
    assert_eq!(
        executed[0].text,
        "SELECT COUNT(*) FROM `users` AS u WHERE u.`age` > ?"
    );
    assert_eq!(
        executed[1].text,
        "SELECT u.* FROM `users` AS u WHERE u.`age` > ? ORDER BY u.`name` LIMIT ?, ?"
    );
    assert_eq!(
        executed[1].args,
        vec![Value::from(20i64), Value::from(10u64), Value::from(10u64)]
    );
    assert_eq!(paginator.total(), Some(25));
    assert_eq!(paginator.pages(), Some(3));
}

#[test]
fn test_count_does_not_notify_find_hooks() {
    let (driver, registry) = setup(Dialect::MySql);
    let paginator = Arc::new(Paginator::new("user", 1, 5));
    let users = registry.mapper("user").unwrap().with_hook(paginator.clone());

    driver.push_rows(vec![Row::from_pairs([("COUNT(*)", 4i64)])]);
    assert_eq!(users.count(&FindArgs::default()).unwrap(), 4);
    assert_eq!(driver.executed().len(), 1);
    assert_eq!(paginator.total(), None);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl MapperHook for Recorder {
    fn db_populate(&self, _mapper: &Mapper, entity: &Entity) {
        self.push(format!(
            "populate {:?} erroneous={}",
            entity.identity(),
            entity.is_erroneous()
        ));
    }

    fn db_insert(&self, mapper: &Mapper, _entity: &Entity) {
        self.push(format!("insert {}", mapper.name()));
    }

    fn db_update(&self, _mapper: &Mapper, entity: &Entity) {
        self.push(format!("update {:?}", entity.dirty_fields()));
    }

    fn db_remove(&self, _mapper: &Mapper, identity: i64) {
        self.push(format!("remove {identity}"));
    }

    fn post_db_query(&self, _mapper: &Mapper, query: &QueryPart, timing: &QueryTiming) {
        self.push(format!("ran {} ({} rows)", query.text, timing.affected_rows));
    }
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[test]
fn test_hooks_see_writes_in_order() {
    let (driver, registry) = setup(Dialect::MySql);
    let recorder = Arc::new(Recorder::default());
    registry.subscribe(recorder.clone());
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set("name", "h").unwrap();
    driver.push_insert(3);
    users.insert(&mut user).unwrap();
    driver.push_affected(1);
    users.remove(&user).unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "insert User".to_string(),
            "ran INSERT INTO `users` (`name`) VALUES (?) (1 rows)".to_string(),
            "remove 3".to_string(),
            "ran DELETE FROM `users` WHERE `id` = ? LIMIT 1 (1 rows)".to_string(),
        ]
    );
}

#[test]
fn test_hooks_see_lookups_and_updates() {
    let (driver, registry) = setup(Dialect::MySql);
    let recorder = Arc::new(Recorder::default());
    registry.subscribe(recorder.clone());
    let users = registry.mapper("user").unwrap();

    driver.push_rows(vec![Row::from_pairs([
        ("id", Value::from(2i64)),
        ("name", Value::from("found")),
    ])]);
    let mut user = users.get(2).unwrap().unwrap();
    driver.push_rows(Vec::new());
    assert!(users.get(3).unwrap().is_none());

    // nothing dirty: no statement and no update event
    assert!(!users.update(&mut user).unwrap());
    user.set("name", "renamed").unwrap();
    assert!(users.update(&mut user).unwrap());

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "ran SELECT u.* FROM `users` AS u WHERE u.`id` = ? LIMIT 1 (1 rows)".to_string(),
            "populate Some(2) erroneous=false".to_string(),
            "ran SELECT u.* FROM `users` AS u WHERE u.`id` = ? LIMIT 1 (0 rows)".to_string(),
            "populate Some(3) erroneous=true".to_string(),
            "update [\"name\"]".to_string(),
            "ran UPDATE `users` AS u SET `name` = ? WHERE u.`id` = ? LIMIT 1 (0 rows)".to_string(),
        ]
    );
}

/// Fills `display` from `name` whenever a row is loaded.
struct DisplayName;

impl EntityBehavior for DisplayName {
    fn after_load(&self, entity: &mut Entity) {
        if let Ok(Some(name)) = entity.get_str("name") {
            let _ = entity.set_raw("display", format!("@{name}"));
        }
    }
}

#[test]
fn test_after_load_runs_on_populate_and_collection_access() {
    let def = EntityDef::builder("Member")
        .table("members")
        .alias("m")
        .member(Member::new("name"))
        .member(Member::new("display"))
        .behavior(Arc::new(DisplayName))
        .build()
        .unwrap();
    let driver = Arc::new(MockDriver::new());
    let members = Mapper::new(def, driver.clone());

    driver.push_rows(vec![Row::from_pairs([
        ("id", Value::from(1i64)),
        ("name", Value::from("ada")),
    ])]);
    let ada = members.get(1).unwrap().unwrap();
    assert_eq!(ada.get_str("display").unwrap().as_deref(), Some("@ada"));
    assert!(ada.dirty_fields().is_empty());

    driver.push_rows(vec![
        Row::from_pairs([("id", Value::from(1i64)), ("name", Value::from("ada"))]),
        Row::from_pairs([("id", Value::from(2i64)), ("name", Value::from("bob"))]),
    ]);
    let mut all = members.find(Conditions::all()).unwrap();
    let bob = all.get(1).unwrap().unwrap();
    assert_eq!(bob.get_str("display").unwrap().as_deref(), Some("@bob"));
}

#[test]
fn test_postgres_statement_shapes() {
    let (driver, registry) = setup(Dialect::Postgres);
    let users = registry.mapper("user").unwrap();

    let mut user = users.create();
    user.set("name", "pg").unwrap();
    driver.push_insert(11);
    users.insert(&mut user).unwrap();
    assert_eq!(
        driver.last().unwrap().text,
        "INSERT INTO \"users\" (\"name\") VALUES (?) RETURNING \"id\""
    );
    assert_eq!(user.identity(), Some(11));

    user.set("age", 1i64).unwrap();
    users.update(&mut user).unwrap();
    assert_eq!(
        driver.last().unwrap().text,
        "UPDATE \"users\" AS u SET \"age\" = ? WHERE u.\"id\" = ?"
    );

    users.limit(30, 15).find().unwrap();
    let page = driver.last().unwrap();
    assert_eq!(page.text, "SELECT u.* FROM \"users\" AS u LIMIT ? OFFSET ?");
    assert_eq!(page.args, vec![Value::from(15u64), Value::from(30u64)]);

    users.remove(11i64).unwrap();
    assert_eq!(
        driver.last().unwrap().text,
        "DELETE FROM \"users\" WHERE \"id\" = ?"
    );
}
