//! Per-type entity definitions.
//!
//! An [`EntityDef`] is declared once per entity type and is immutable at
//! runtime: table, alias, primary key and the ordered member map (name →
//! rules and optional default). Member order drives column order in
//! generated statements.

use super::error::EntityError;
use super::rule::Rule;
use super::Entity;
use crate::query::conditions::is_identifier;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle hooks an entity type may provide.
pub trait EntityBehavior: Send + Sync {
    /// Called after a row has been copied onto the entity.
    fn after_load(&self, _entity: &mut Entity) {}

    /// Extra integrity checks run by [`Entity::ensure`] before a write.
    fn ensure(&self, _entity: &Entity) -> Result<(), EntityError> {
        Ok(())
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct Member {
    name: String,
    rules: Vec<Rule>,
    default: Option<Value>,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            default: None,
        }
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Shorthand for `.rule(Rule::Required)`.
    #[must_use]
    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Required))
    }

    /// First rule `value` fails, if any.
    pub(crate) fn violated_rule(&self, value: &Value) -> Option<&Rule> {
        self.rules.iter().find(|rule| !rule.check(value))
    }
}

/// Immutable description of an entity type.
pub struct EntityDef {
    name: String,
    table: String,
    alias: String,
    primary_key: String,
    members: Vec<Member>,
    behavior: Option<Arc<dyn EntityBehavior>>,
}

impl EntityDef {
    /// Start a definition for the entity type `name`.
    pub fn builder(name: impl Into<String>) -> EntityDefBuilder {
        EntityDefBuilder {
            name: name.into(),
            table: None,
            alias: None,
            primary_key: "id".to_string(),
            members: Vec::new(),
            behavior: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
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

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn behavior(&self) -> Option<&Arc<dyn EntityBehavior>> {
        self.behavior.as_ref()
    }
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("alias", &self.alias)
            .field("primary_key", &self.primary_key)
            .field("members", &self.members)
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}

/// Builder returned by [`EntityDef::builder`].
pub struct EntityDefBuilder {
    name: String,
    table: Option<String>,
    alias: Option<String>,
    primary_key: String,
    members: Vec<Member>,
    behavior: Option<Arc<dyn EntityBehavior>>,
}

impl EntityDefBuilder {
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Table alias used to qualify fields. Defaults to the lower-cased name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    #[must_use]
    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn behavior(mut self, behavior: Arc<dyn EntityBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Validate and freeze the definition.
    ///
    /// # Errors
    ///
    /// `EntityError::Definition` for a missing table, an invalid alias,
    /// primary key or member name, a duplicate member, or a member that
    /// shadows the primary key.
    pub fn build(self) -> Result<Arc<EntityDef>, EntityError> {
        let table = self
            .table
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| EntityError::Definition(format!("entity {} has no table", self.name)))?;
        let alias = self.alias.unwrap_or_else(|| self.name.to_lowercase());

        for (what, ident) in [("alias", &alias), ("primary key", &self.primary_key)] {
            if !is_identifier(ident) || ident.contains('.') {
                return Err(EntityError::Definition(format!(
                    "entity {}: invalid {what} '{ident}'",
                    self.name
                )));
            }
        }

        for (i, member) in self.members.iter().enumerate() {
            if !is_identifier(&member.name) || member.name.contains('.') {
                return Err(EntityError::Definition(format!(
                    "entity {}: invalid member name '{}'",
                    self.name, member.name
                )));
            }
            if member.name == self.primary_key {
                return Err(EntityError::Definition(format!(
                    "entity {}: member '{}' shadows the primary key",
                    self.name, member.name
                )));
            }
            if self.members[..i].iter().any(|m| m.name == member.name) {
                return Err(EntityError::Definition(format!(
                    "entity {}: duplicate member '{}'",
                    self.name, member.name
                )));
            }
        }

        Ok(Arc::new(EntityDef {
            name: self.name,
            table,
            alias,
            primary_key: self.primary_key,
            members: self.members,
            behavior: self.behavior,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_table() {
        let err = EntityDef::builder("User").build().unwrap_err();
        assert!(matches!(err, EntityError::Definition(_)));
    }

    #[test]
    fn test_build_defaults() {
        let def = EntityDef::builder("User")
            .table("users")
            .member(Member::new("name").required())
            .build()
            .unwrap();
        assert_eq!(def.alias(), "user");
        assert_eq!(def.primary_key(), "id");
        assert!(def.member("name").unwrap().is_required());
    }

    #[test]
    fn test_build_rejects_bad_members() {
        let dup = EntityDef::builder("User")
            .table("users")
            .member(Member::new("name"))
            .member(Member::new("name"))
            .build();
        assert!(dup.is_err());

        let shadow = EntityDef::builder("User")
            .table("users")
            .member(Member::new("id"))
            .build();
        assert!(shadow.is_err());

        let bad = EntityDef::builder("User")
            .table("users")
            .member(Member::new("na me"))
            .build();
        assert!(bad.is_err());
    }
}
