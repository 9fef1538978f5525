//! Shared services a model needs at runtime

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::connection::ConnectionInterface;
use crate::error::OrmResult;
use crate::manager::DatabaseManager;
use crate::model::definition::{ModelDefinition, ModelSchema};
use crate::observers::EventDispatcher;

/// Morph type value -> entity, used to resolve `MorphTo` targets
#[derive(Debug, Clone, Default)]
pub struct MorphMap {
    entries: HashMap<String, ModelSchema>,
}

impl MorphMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `D` under its `morph_class()`
    pub fn register<D: ModelDefinition>(mut self) -> Self {
        self.entries.insert(D::morph_class().to_string(), ModelSchema::of::<D>());
        self
    }

    /// Register `D` under an explicit alias
    pub fn alias<D: ModelDefinition>(mut self, alias: &str) -> Self {
        self.entries.insert(alias.to_string(), ModelSchema::of::<D>());
        self
    }

    pub fn get(&self, morph_type: &str) -> Option<ModelSchema> {
        self.entries.get(morph_type).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Connection, event dispatcher and morph map shared by models, builders
/// and relations. Cloning is cheap.
#[derive(Clone)]
pub struct ModelContext {
    connection: Arc<dyn ConnectionInterface>,
    manager: Option<Arc<DatabaseManager>>,
    events: Arc<EventDispatcher>,
    morph_map: Arc<MorphMap>,
}

impl ModelContext {
    pub fn new(connection: Arc<dyn ConnectionInterface>) -> Self {
        Self {
            connection,
            manager: None,
            events: Arc::new(EventDispatcher::new()),
            morph_map: Arc::new(MorphMap::new()),
        }
    }

    /// Use the manager's default connection, and resolve entities that name
    /// a connection through the manager too
    pub fn from_manager(manager: Arc<DatabaseManager>) -> OrmResult<Self> {
        let connection = manager.connection(None)?;
        Ok(Self {
            manager: Some(manager),
            ..Self::new(connection)
        })
    }

    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    /// Same services on another connection, e.g. the one handed to a
    /// [`transaction`](crate::transaction::transaction) closure
    pub fn with_connection(&self, connection: Arc<dyn ConnectionInterface>) -> Self {
        Self {
            connection,
            manager: None,
            ..self.clone()
        }
    }

    pub fn with_morph_map(mut self, morph_map: MorphMap) -> Self {
        self.morph_map = Arc::new(morph_map);
        self
    }

    pub fn connection(&self) -> &Arc<dyn ConnectionInterface> {
        &self.connection
    }

    /// Connection for an entity: its named connection when one is declared
    /// and a manager is available, the context's connection otherwise
    pub fn connection_for(&self, schema: &ModelSchema) -> OrmResult<Arc<dyn ConnectionInterface>> {
        match (schema.connection, &self.manager) {
            (Some(name), Some(manager)) => manager.connection(Some(name)),
            _ => Ok(self.connection.clone()),
        }
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn morph_map(&self) -> &MorphMap {
        &self.morph_map
    }
}

impl fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelContext")
            .field("connection", &self.connection.name())
            .field("manager", &self.manager.is_some())
            .field("morph_map", &self.morph_map.len())
            .finish()
    }
}
