//! Explicit mapper registry.
//!
//! A [`Registry`] is built once at start-up around a driver and passed to
//! whatever needs mappers. Entity types are registered by definition and
//! looked up by case-insensitive name; each mapper is created on first use
//! and shared afterwards.

use super::hooks::{HookBus, MapperHook};
use super::{Mapper, MapperError};
use crate::config::DatabaseConfig;
use crate::connection;
use crate::driver::{Driver, DriverError};
use crate::entity::{Entity, EntityDef};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub struct Registry {
    driver: Arc<dyn Driver>,
    hooks: Arc<HookBus>,
    slow_query: Option<Duration>,
    defs: RwLock<HashMap<String, Arc<EntityDef>>>,
    mappers: RwLock<HashMap<String, Mapper>>,
}

impl Registry {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            hooks: Arc::new(HookBus::new()),
            slow_query: None,
            defs: RwLock::new(HashMap::new()),
            mappers: RwLock::new(HashMap::new()),
        }
    }

    /// Connect with `config` and apply its slow-statement threshold.
    ///
    /// # Errors
    ///
    /// `Driver(Connection)` when the connection cannot be established.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, MapperError> {
        let driver = connection::connect(config).map_err(DriverError::from)?;
        let registry = Self::new(Arc::new(driver));
        Ok(match config.slow_query_ms {
            0 => registry,
            ms => registry.with_slow_query_threshold(Duration::from_millis(ms)),
        })
    }

    /// Mappers created from now on log statements slower than `threshold`.
    #[must_use]
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query = Some(threshold);
        self
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Subscribe `hook` to every mapper of this registry, including those
    /// already handed out.
    pub fn subscribe(&self, hook: Arc<dyn MapperHook>) {
        self.hooks.subscribe(hook);
    }

    /// Register an entity type under its lower-cased name.
    ///
    /// # Errors
    ///
    /// `Definition` when the name is already taken.
    pub fn define(&self, def: Arc<EntityDef>) -> Result<(), MapperError> {
        let key = def.name().to_lowercase();
        let mut defs = self.defs.write().unwrap_or_else(PoisonError::into_inner);
        if defs.contains_key(&key) {
            return Err(MapperError::Definition(format!(
                "entity {} is already defined",
                def.name()
            )));
        }
        log::debug!("registered entity {} on table {}", def.name(), def.table());
        defs.insert(key, def);
        Ok(())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name.to_lowercase())
    }

    /// The shared mapper for entity type `name`.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when no such type was defined.
    pub fn mapper(&self, name: &str) -> Result<Mapper, MapperError> {
        let key = name.to_lowercase();
        if let Some(mapper) = self
            .mappers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(mapper.clone());
        }

        let def = self
            .defs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or_else(|| MapperError::UnknownEntity(name.to_string()))?;

        let mut mappers = self.mappers.write().unwrap_or_else(PoisonError::into_inner);
        let mapper = mappers.entry(key).or_insert_with(|| {
            let mapper = Mapper::with_hooks(def, Arc::clone(&self.driver), Arc::clone(&self.hooks));
            match self.slow_query {
                Some(threshold) => mapper.with_slow_query_threshold(threshold),
                None => mapper,
            }
        });
        Ok(mapper.clone())
    }

    /// Blank entity of type `name`.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when no such type was defined.
    pub fn entity(&self, name: &str) -> Result<Entity, MapperError> {
        Ok(self.mapper(name)?.create())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .defs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        f.debug_struct("Registry")
            .field("entities", &names)
            .field("hooks", &self.hooks)
            .finish()
    }
}
