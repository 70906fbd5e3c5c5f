//! Statement builder for one entity type.
//!
//! `QueryBuilder` is pure: it turns find arguments or an entity's
//! field state into a [`QueryPart`] and never touches the driver. Values are
//! never interpolated into the text; they travel in `QueryPart::args` and are
//! bound by the driver's prepared-statement binder.

use super::conditions::{is_identifier, parse_field_expr, Conditions, Operator, OrderBy};
use super::dialect::Dialect;
use super::error::BuildError;
use super::part::QueryPart;
use crate::entity::{Entity, EntityDef};
use crate::value::{self, Param, Params, Value};

/// Find arguments consumed by `build_find` / `build_count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub conditions: Conditions,
    pub order: OrderBy,
    pub offset: Option<u64>,
    pub amount: Option<u64>,
}

impl FindArgs {
    pub fn new(conditions: Conditions) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }
}

impl From<Conditions> for FindArgs {
    fn from(conditions: Conditions) -> Self {
        Self::new(conditions)
    }
}

/// A row addressed for deletion: a raw identity or a persisted entity.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Identity(i64),
    Entity(&'a Entity),
}

impl Target<'_> {
    pub fn identity(&self) -> Result<i64, BuildError> {
        match self {
            Target::Identity(id) => Ok(*id),
            Target::Entity(entity) => entity.identity().ok_or(BuildError::MissingIdentity),
        }
    }
}

impl From<i64> for Target<'_> {
    fn from(id: i64) -> Self {
        Target::Identity(id)
    }
}

impl<'a> From<&'a Entity> for Target<'a> {
    fn from(entity: &'a Entity) -> Self {
        Target::Entity(entity)
    }
}

impl<'a> From<&'a mut Entity> for Target<'a> {
    fn from(entity: &'a mut Entity) -> Self {
        Target::Entity(entity)
    }
}

/// Renders statements against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    entity: String,
    table: String,
    alias: String,
    primary_key: String,
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(def: &EntityDef, dialect: Dialect) -> Self {
        Self {
            entity: def.name().to_string(),
            table: def.table().to_string(),
            alias: def.alias().to_string(),
            primary_key: def.primary_key().to_string(),
            dialect,
        }
    }

    /// Builder over a bare table, for hand-written queries.
    pub fn for_table(
        table: impl Into<String>,
        alias: impl Into<String>,
        primary_key: impl Into<String>,
        dialect: Dialect,
    ) -> Self {
        let table = table.into();
        Self {
            entity: table.clone(),
            table,
            alias: alias.into(),
            primary_key: primary_key.into(),
            dialect,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Alias-qualified, quoted field reference. A dotted name keeps its own
    /// qualifier (`j.title` → `` j.`title` ``).
    pub fn field(&self, name: &str) -> String {
        match name.rsplit_once('.') {
            Some((qualifier, column)) => format!("{qualifier}.{}", self.dialect.quote(column)),
            None => format!("{}.{}", self.alias, self.dialect.quote(name)),
        }
    }

    /// Unqualified, quoted column name.
    pub fn column(&self, name: &str) -> String {
        self.dialect.quote(name)
    }

    fn quoted_table(&self) -> String {
        self.dialect.quote(&self.table)
    }

    /// Context value a template can reference by name.
    pub(crate) fn context(&self, key: &str) -> Option<&str> {
        match key {
            "table" => Some(&self.table),
            "alias" => Some(&self.alias),
            "primary_key" => Some(&self.primary_key),
            "entity" => Some(&self.entity),
            _ => None,
        }
    }

    /// `WHERE` clause for a set of conditions.
    ///
    /// [`Conditions::All`] yields an empty part. A mapping must produce at
    /// least one clause.
    pub fn build_where(&self, conditions: &Conditions) -> Result<QueryPart, BuildError> {
        let params = match conditions {
            Conditions::All => return Ok(QueryPart::default()),
            Conditions::Where(params) => params,
        };
        let clauses = self.build_clauses(params)?;
        if clauses.is_empty() {
            return Err(BuildError::InvalidCondition(
                "condition mapping produced no clause".to_string(),
            ));
        }
        Ok(QueryPart::text("WHERE").then(clauses))
    }

    /// AND-joined clauses, without the `WHERE` keyword.
    fn build_clauses(&self, params: &Params) -> Result<QueryPart, BuildError> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        for (expr, param) in params.iter() {
            let (field, op) = parse_field_expr(expr)?;
            let quoted = self.field(field);

            if op.is_membership() {
                let values = param.values();
                // an empty list constrains nothing
                if values.is_empty() {
                    continue;
                }
                clauses.push(format!(
                    "{quoted} {} ({})",
                    op.sql(),
                    placeholders(values.len())
                ));
                args.extend(values.iter().cloned());
                continue;
            }

            match param {
                Param::One(value) => clauses.push(comparison(&quoted, op, value, &mut args)),
                Param::Many(values) => {
                    for value in values {
                        clauses.push(comparison(&quoted, op, value, &mut args));
                    }
                }
            }
        }

        Ok(QueryPart::new(clauses.join(" AND "), args))
    }

    /// `ORDER BY` clause. Directions are limited to `ASC` / `DESC` and kept
    /// as written.
    pub fn build_order_by(&self, order: &OrderBy) -> Result<QueryPart, BuildError> {
        let items: Vec<&str> = match order {
            OrderBy::None => return Ok(QueryPart::default()),
            OrderBy::Field(field) => vec![field.as_str()],
            OrderBy::Fields(fields) => fields.iter().map(String::as_str).collect(),
        };

        let mut rendered = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (field, direction) = match item.split_once(' ') {
                Some((field, direction)) => (field, Some(direction.trim())),
                None => (item, None),
            };
            if !is_identifier(field) {
                return Err(BuildError::InvalidOrder(format!("'{item}' does not name a field")));
            }
            match direction {
                None => rendered.push(self.field(field)),
                Some(dir)
                    if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") =>
                {
                    rendered.push(format!("{} {dir}", self.field(field)));
                }
                Some(dir) => {
                    return Err(BuildError::InvalidOrder(format!(
                        "unknown direction '{dir}' in '{item}'"
                    )))
                }
            }
        }

        if rendered.is_empty() {
            return Ok(QueryPart::default());
        }
        Ok(QueryPart::text(format!("ORDER BY {}", rendered.join(", "))))
    }

    /// `LIMIT` clause.
    ///
    /// `offset` alone takes the first `offset` rows; `offset` with `amount`
    /// skips `offset` rows and takes `amount`. `amount` alone is rejected.
    pub fn build_limit(
        &self,
        offset: Option<u64>,
        amount: Option<u64>,
    ) -> Result<QueryPart, BuildError> {
        match (offset, amount) {
            (None, None) => Ok(QueryPart::default()),
            (None, Some(_)) => Err(BuildError::InvalidLimit),
            (Some(count), None) => Ok(QueryPart::new("LIMIT ?", vec![Value::from(count)])),
            (Some(offset), Some(amount)) => Ok(match self.dialect {
                Dialect::MySql => QueryPart::new(
                    "LIMIT ?, ?",
                    vec![Value::from(offset), Value::from(amount)],
                ),
                Dialect::Postgres => QueryPart::new(
                    "LIMIT ? OFFSET ?",
                    vec![Value::from(amount), Value::from(offset)],
                ),
            }),
        }
    }

    fn select_prefix(&self) -> QueryPart {
        QueryPart::text(format!(
            "SELECT {alias}.* FROM {table} AS {alias}",
            alias = self.alias,
            table = self.quoted_table()
        ))
    }

    /// `SELECT alias.* ...` with where, order and limit, in that order.
    pub fn build_find(&self, args: &FindArgs) -> Result<QueryPart, BuildError> {
        Ok(self
            .select_prefix()
            .then(self.build_where(&args.conditions)?)
            .then(self.build_order_by(&args.order)?)
            .then(self.build_limit(args.offset, args.amount)?))
    }

    /// `SELECT COUNT(*) ...` over the same arguments.
    pub fn build_count(&self, args: &FindArgs) -> Result<QueryPart, BuildError> {
        let prefix = QueryPart::text(format!(
            "SELECT COUNT(*) FROM {table} AS {alias}",
            alias = self.alias,
            table = self.quoted_table()
        ));
        let order = match self.dialect {
            // ungrouped aggregate: postgres rejects ORDER BY on plain columns
            Dialect::Postgres => QueryPart::default(),
            Dialect::MySql => self.build_order_by(&args.order)?,
        };
        Ok(prefix
            .then(self.build_where(&args.conditions)?)
            .then(order)
            .then(self.build_limit(args.offset, args.amount)?))
    }

    /// Point lookup for an entity: by primary key when it has an identity,
    /// otherwise an equality match on every field currently set.
    pub fn build_find_object(&self, entity: &Entity) -> Result<QueryPart, BuildError> {
        if let Some(id) = entity.identity() {
            return Ok(self.select_prefix().then(self.primary_key_where(id)).then(
                QueryPart::text("LIMIT 1"),
            ));
        }

        let snapshot: Params = entity
            .set_values()
            .map(|(name, value)| (name, value.clone()))
            .collect();
        if snapshot.is_empty() {
            return Err(BuildError::InvalidCondition(
                "entity has neither an identity nor any field set".to_string(),
            ));
        }
        Ok(self
            .select_prefix()
            .then(self.build_where(&Conditions::Where(snapshot))?))
    }

    fn primary_key_where(&self, id: i64) -> QueryPart {
        QueryPart::new(
            format!("WHERE {} = ?", self.field(&self.primary_key)),
            vec![Value::from(id)],
        )
    }

    /// `INSERT` binding every field currently set (and the identity, when
    /// one was assigned up front).
    pub fn build_insert(&self, entity: &Entity) -> Result<QueryPart, BuildError> {
        let mut columns = Vec::new();
        let mut args = Vec::new();
        if let Some(id) = entity.identity() {
            columns.push(self.column(&self.primary_key));
            args.push(Value::from(id));
        }
        for (name, value) in entity.set_values() {
            columns.push(self.column(name));
            args.push(value.clone());
        }

        let mut part = if columns.is_empty() {
            QueryPart::text(match self.dialect {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", self.quoted_table()),
                Dialect::Postgres => format!("INSERT INTO {} DEFAULT VALUES", self.quoted_table()),
            })
        } else {
            QueryPart::new(
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    self.quoted_table(),
                    columns.join(", "),
                    placeholders(args.len())
                ),
                args,
            )
        };

        if self.dialect.returns_identity() {
            part.append(QueryPart::text(format!(
                "RETURNING {}",
                self.column(&self.primary_key)
            )));
        }
        Ok(part)
    }

    /// `UPDATE` of the dirty fields only, scoped by primary key.
    ///
    /// Returns `Ok(None)` when nothing is dirty.
    pub fn build_update(&self, entity: &Entity) -> Result<Option<QueryPart>, BuildError> {
        let id = entity.identity().ok_or(BuildError::MissingIdentity)?;

        let mut assignments = Vec::new();
        let mut args = Vec::new();
        for (name, value) in entity.dirty_values() {
            assignments.push(format!("{} = ?", self.column(name)));
            args.push(value);
        }
        if assignments.is_empty() {
            return Ok(None);
        }

        let mut part = QueryPart::new(
            format!(
                "UPDATE {table} AS {alias} SET {}",
                assignments.join(", "),
                table = self.quoted_table(),
                alias = self.alias
            ),
            args,
        )
        .then(self.primary_key_where(id));
        if self.dialect.limits_writes() {
            part.append(QueryPart::text("LIMIT 1"));
        }
        Ok(Some(part))
    }

    /// Single-row `DELETE` by primary key.
    pub fn build_delete<'a>(&self, target: impl Into<Target<'a>>) -> Result<QueryPart, BuildError> {
        let id = target.into().identity()?;
        let mut part = QueryPart::new(
            format!(
                "DELETE FROM {} WHERE {} = ?",
                self.quoted_table(),
                self.column(&self.primary_key)
            ),
            vec![Value::from(id)],
        );
        if self.dialect.limits_writes() {
            part.append(QueryPart::text("LIMIT 1"));
        }
        Ok(part)
    }
}

fn comparison(quoted: &str, op: Operator, value: &Value, args: &mut Vec<Value>) -> String {
    if value::is_null(value) {
        match op {
            Operator::Eq => return format!("{quoted} IS NULL"),
            Operator::Ne => return format!("{quoted} IS NOT NULL"),
            _ => {}
        }
    }
    args.push(value.clone());
    format!("{quoted} {} ?", op.sql())
}

/// `?, ?, ...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::for_table("users", "u", "id", Dialect::MySql)
    }

    #[test]
    fn test_build_where_all_is_empty() {
        let part = builder().build_where(&Conditions::All).unwrap();
        assert!(part.is_empty());
    }

    #[test]
    fn test_build_where_operators_and_lists() {
        let conditions = Conditions::new()
            .with("name", "bob")
            .with("age >", 3i64)
            .with("id IN", vec![1i64, 2, 3])
            .with("tag", vec!["a", "b"]);
        let part = builder().build_where(&conditions).unwrap();
        assert_eq!(
            part.text,
            "WHERE u.`name` = ? AND u.`age` > ? AND u.`id` IN (?, ?, ?) AND u.`tag` = ? AND u.`tag` = ?"
        );
        assert_eq!(part.args.len(), 7);
        assert_eq!(part.placeholder_count(), part.args.len());
        assert!(!part.text.ends_with("AND"));
    }

    #[test]
    fn test_build_where_empty_in_list_emits_nothing() {
        let conditions = Conditions::new()
            .with("id IN", Vec::<i64>::new())
            .with("name", "bob");
        let part = builder().build_where(&conditions).unwrap();
        assert_eq!(part.text, "WHERE u.`name` = ?");
        assert!(!part.text.contains("()"));
    }

    #[test]
    fn test_build_where_rejects_mapping_without_clauses() {
        let only_empty = Conditions::new().with("id IN", Vec::<i64>::new());
        assert!(matches!(
            builder().build_where(&only_empty),
            Err(BuildError::InvalidCondition(_))
        ));
        assert!(builder().build_where(&Conditions::new()).is_err());
    }

    #[test]
    fn test_build_where_null_uses_is_null() {
        let conditions = Conditions::new()
            .with("deleted_at", value::null())
            .with("owner !", value::null());
        let part = builder().build_where(&conditions).unwrap();
        assert_eq!(part.text, "WHERE u.`deleted_at` IS NULL AND u.`owner` IS NOT NULL");
        assert!(part.args.is_empty());
    }

    #[test]
    fn test_build_order_by_shapes() {
        let b = builder();
        assert!(b.build_order_by(&OrderBy::None).unwrap().is_empty());
        assert_eq!(
            b.build_order_by(&OrderBy::from("name desc")).unwrap().text,
            "ORDER BY u.`name` desc"
        );
        assert_eq!(
            b.build_order_by(&OrderBy::from(["name", "id DESC"])).unwrap().text,
            "ORDER BY u.`name`, u.`id` DESC"
        );
        assert!(matches!(
            b.build_order_by(&OrderBy::from("name; DROP")),
            Err(BuildError::InvalidOrder(_))
        ));
    }

    #[test]
    fn test_build_limit_shapes() {
        let b = builder();
        let none = b.build_limit(None, None).unwrap();
        assert_eq!(none.text, "");
        assert!(none.args.is_empty());

        let first = b.build_limit(Some(5), None).unwrap();
        assert_eq!(first.text, "LIMIT ?");
        assert_eq!(first.args, vec![Value::from(5u64)]);

        let window = b.build_limit(Some(5), Some(10)).unwrap();
        assert_eq!(window.text, "LIMIT ?, ?");
        assert_eq!(window.args, vec![Value::from(5u64), Value::from(10u64)]);

        assert_eq!(b.build_limit(None, Some(10)), Err(BuildError::InvalidLimit));
    }

    #[test]
    fn test_build_limit_postgres() {
        let b = QueryBuilder::for_table("users", "u", "id", Dialect::Postgres);
        let window = b.build_limit(Some(5), Some(10)).unwrap();
        assert_eq!(window.text, "LIMIT ? OFFSET ?");
        assert_eq!(window.args, vec![Value::from(10u64), Value::from(5u64)]);
    }

    #[test]
    fn test_build_find_composes_in_order() {
        let args = FindArgs {
            conditions: Conditions::new().with("name", "bob"),
            order: OrderBy::from("id DESC"),
            offset: Some(0),
            amount: Some(10),
        };
        let part = builder().build_find(&args).unwrap();
        assert_eq!(
            part.text,
            "SELECT u.* FROM `users` AS u WHERE u.`name` = ? ORDER BY u.`id` DESC LIMIT ?, ?"
        );
        assert_eq!(
            part.args,
            vec![Value::from("bob"), Value::from(0u64), Value::from(10u64)]
        );
    }

    #[test]
    fn test_build_count() {
        let part = builder().build_count(&FindArgs::default()).unwrap();
        assert_eq!(part.text, "SELECT COUNT(*) FROM `users` AS u");
    }

    #[test]
    fn test_build_delete_by_identity() {
        let part = builder().build_delete(7i64).unwrap();
        assert_eq!(part.text, "DELETE FROM `users` WHERE `id` = ? LIMIT 1");
        assert_eq!(part.args, vec![Value::from(7i64)]);
    }
}
