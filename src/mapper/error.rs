use crate::driver::DriverError;
use crate::entity::EntityError;
use crate::query::BuildError;
use std::fmt;

/// Error type for mapper operations
#[derive(Debug, Clone, PartialEq)]
pub enum MapperError {
    /// The registry was given an unusable entity definition
    Definition(String),
    /// No entity type is registered under this name
    UnknownEntity(String),
    /// The statement could not be rendered
    Build(BuildError),
    /// Validation or field access on the entity failed
    Entity(EntityError),
    /// The driver failed to execute the statement
    Driver(DriverError),
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::Definition(msg) => write!(f, "Invalid mapper definition: {msg}"),
            MapperError::UnknownEntity(name) => write!(f, "Unknown entity type: {name}"),
            MapperError::Build(e) => write!(f, "Query build error: {e}"),
            MapperError::Entity(e) => write!(f, "Entity error: {e}"),
            MapperError::Driver(e) => write!(f, "Driver error: {e}"),
        }
    }
}

impl std::error::Error for MapperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapperError::Build(e) => Some(e),
            MapperError::Entity(e) => Some(e),
            MapperError::Driver(e) => Some(e),
            MapperError::Definition(_) | MapperError::UnknownEntity(_) => None,
        }
    }
}

impl From<BuildError> for MapperError {
    fn from(err: BuildError) -> Self {
        MapperError::Build(err)
    }
}

impl From<EntityError> for MapperError {
    fn from(err: EntityError) -> Self {
        MapperError::Entity(err)
    }
}

impl From<DriverError> for MapperError {
    fn from(err: DriverError) -> Self {
        MapperError::Driver(err)
    }
}
