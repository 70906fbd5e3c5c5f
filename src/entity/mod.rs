//! Entities: validated field state for one persisted record.
//!
//! An [`Entity`] holds an optional identity (primary-key value), the values
//! of its declared members, the set of members mutated since load, and any
//! overflow columns a query returned that the definition does not declare.
//!
//! Validated sets (`set`) run the member's rules and mark the field dirty.
//! Raw sets (`set_raw`) are how database rows are copied in: they store the
//! value as-is and leave the dirty set untouched, since they describe the
//! persisted state rather than a pending change.
//!
//! # Examples
//!
//! ```
//! use tidemark::entity::{Entity, EntityDef, Member, Rule};
//!
//! let def = EntityDef::builder("User")
//!     .table("users")
//!     .member(Member::new("name").required().rule(Rule::MaxLength(32)))
//!     .member(Member::new("age").rule(Rule::Integer))
//!     .build()
//!     .unwrap();
//!
//! let mut user = Entity::new(def);
//! user.set("name", "ada").unwrap();
//! assert!(user.set("age", "old").is_err());
//! assert_eq!(user.dirty_fields(), vec!["name"]);
//! ```

pub mod definition;
pub mod error;
pub mod rule;

#[doc(inline)]
pub use definition::{EntityBehavior, EntityDef, EntityDefBuilder, Member};
#[doc(inline)]
pub use error::EntityError;
#[doc(inline)]
pub use rule::Rule;

use crate::value::{self, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// One record of an entity type.
#[derive(Debug, Clone)]
pub struct Entity {
    def: Arc<EntityDef>,
    identity: Option<i64>,
    values: HashMap<String, Value>,
    dirty: HashSet<String>,
    overflow: BTreeMap<String, Value>,
    erroneous: bool,
}

impl Entity {
    /// A blank, not-yet-persisted entity with member defaults applied.
    /// Defaults are initial state, not pending changes: they are not dirty.
    pub fn new(def: Arc<EntityDef>) -> Self {
        let values = def
            .members()
            .iter()
            .filter_map(|m| m.default().map(|v| (m.name().to_string(), v.clone())))
            .collect();
        Self {
            def,
            identity: None,
            values,
            dirty: HashSet::new(),
            overflow: BTreeMap::new(),
            erroneous: false,
        }
    }

    /// A blank entity addressing an existing row, ready for a point lookup.
    pub fn with_identity(def: Arc<EntityDef>, id: i64) -> Self {
        let mut entity = Self::new(def);
        entity.identity = Some(id);
        entity
    }

    pub fn def(&self) -> &Arc<EntityDef> {
        &self.def
    }

    pub fn identity(&self) -> Option<i64> {
        self.identity
    }

    pub fn set_identity(&mut self, id: Option<i64>) {
        self.identity = id;
    }

    /// `true` until the entity has been assigned an identity.
    pub fn is_new(&self) -> bool {
        self.identity.is_none()
    }

    /// Set by a point lookup that found no row.
    pub fn is_erroneous(&self) -> bool {
        self.erroneous
    }

    pub(crate) fn set_erroneous(&mut self, erroneous: bool) {
        self.erroneous = erroneous;
    }

    fn unknown(&self, name: &str) -> EntityError {
        EntityError::UnknownField {
            entity: self.def.name().to_string(),
            field: name.to_string(),
        }
    }

    /// Value of `name`.
    ///
    /// The primary key returns the identity. Overflow fields are consulted
    /// before declared members; `Ok(None)` means a declared member is unset.
    ///
    /// # Errors
    ///
    /// `UnknownField` when `name` is neither declared nor overflow.
    pub fn get(&self, name: &str) -> Result<Option<Value>, EntityError> {
        if name == self.def.primary_key() {
            return Ok(self.identity.map(Value::from));
        }
        self.lookup(name).map(|v| v.cloned())
    }

    fn lookup(&self, name: &str) -> Result<Option<&Value>, EntityError> {
        if let Some(v) = self.overflow.get(name) {
            return Ok(Some(v));
        }
        if self.def.member(name).is_some() {
            return Ok(self.values.get(name));
        }
        Err(self.unknown(name))
    }

    pub fn get_str(&self, name: &str) -> Result<Option<String>, EntityError> {
        Ok(self.get(name)?.as_ref().and_then(value::as_str).map(str::to_string))
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, EntityError> {
        Ok(self.get(name)?.as_ref().and_then(value::as_i64))
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>, EntityError> {
        Ok(self.get(name)?.as_ref().and_then(value::as_f64))
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, EntityError> {
        Ok(self.get(name)?.as_ref().and_then(value::as_bool))
    }

    /// Validated set: runs the member's rules and marks it dirty.
    ///
    /// Setting the primary key assigns the identity instead.
    ///
    /// # Errors
    ///
    /// `Validation` naming the field, the rejected value and the failed rule;
    /// `UnknownField` for undeclared names; `InvalidIdentity` for a
    /// non-integer primary key.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EntityError> {
        let value = value.into();
        if name == self.def.primary_key() {
            return self.assign_identity(&value);
        }
        let member = self.def.member(name).ok_or_else(|| self.unknown(name))?;
        if let Some(rule) = member.violated_rule(&value) {
            return Err(EntityError::Validation {
                field: name.to_string(),
                value: value::render(&value),
                rule: rule.name(),
            });
        }
        self.values.insert(name.to_string(), value);
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// Unvalidated set for trusted, database-sourced values. Leaves the
    /// dirty set untouched.
    ///
    /// # Errors
    ///
    /// `UnknownField` for undeclared names; `InvalidIdentity` for a
    /// non-integer primary key.
    pub fn set_raw(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EntityError> {
        let value = value.into();
        if name == self.def.primary_key() {
            return self.assign_identity(&value);
        }
        if self.def.member(name).is_none() {
            return Err(self.unknown(name));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn assign_identity(&mut self, value: &Value) -> Result<(), EntityError> {
        if value::is_null(value) {
            self.identity = None;
            return Ok(());
        }
        let id = value::as_i64(value)
            .ok_or_else(|| EntityError::InvalidIdentity(value::render(value)))?;
        self.identity = Some(id);
        Ok(())
    }

    /// Keep a column the definition does not declare.
    pub(crate) fn set_overflow(&mut self, name: &str, value: Value) {
        self.overflow.insert(name.to_string(), value);
    }

    pub fn overflow(&self) -> &BTreeMap<String, Value> {
        &self.overflow
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Dirty member names in declaration order.
    pub fn dirty_fields(&self) -> Vec<&str> {
        self.def
            .members()
            .iter()
            .map(Member::name)
            .filter(|name| self.dirty.contains(*name))
            .collect()
    }

    /// Forget pending changes; the current values become the persisted state.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Set members in declaration order.
    pub fn set_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.def
            .members()
            .iter()
            .filter_map(|m| self.values.get(m.name()).map(|v| (m.name(), v)))
    }

    /// Dirty members in declaration order, with their current value.
    pub(crate) fn dirty_values(&self) -> impl Iterator<Item = (&str, Value)> {
        self.def
            .members()
            .iter()
            .filter(|m| self.dirty.contains(m.name()))
            .map(|m| {
                let v = self.values.get(m.name()).cloned().unwrap_or_else(value::null);
                (m.name(), v)
            })
    }

    /// Integrity check before a write: every mandatory member must hold a
    /// non-null value, then the type's own [`EntityBehavior::ensure`] runs.
    ///
    /// # Errors
    ///
    /// `MissingField` naming the first unset mandatory member, or whatever
    /// the behavior reports.
    pub fn ensure(&self) -> Result<(), EntityError> {
        for member in self.def.members().iter().filter(|m| m.is_required()) {
            let missing = self
                .values
                .get(member.name())
                .map_or(true, |v| !Rule::Required.check(v));
            if missing {
                return Err(EntityError::MissingField(member.name().to_string()));
            }
        }
        match self.def.behavior() {
            Some(behavior) => behavior.ensure(self),
            None => Ok(()),
        }
    }
}

impl Serialize for Entity {
    /// Identity under the primary-key name, then set members in declaration
    /// order, then overflow fields.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = self.identity {
            map.serialize_entry(self.def.primary_key(), &id)?;
        }
        for (name, v) in self.set_values() {
            map.serialize_entry(name, &value::to_json(v))?;
        }
        for (name, v) in &self.overflow {
            if self.def.member(name).is_none() {
                map.serialize_entry(name, &value::to_json(v))?;
            }
        }
        map.end()
    }
}
