//! Connection Manager
//!
//! Resolves named connections from configuration, building each one on first
//! request and caching it for later callers.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use emporium_core::ConfigurationManager;

use crate::connection::{build_connection, ConnectionConfig, ConnectionInterface};
use crate::error::{ModelError, OrmResult};

/// Configuration key the database settings live under
pub const DATABASE_CONFIG_KEY: &str = "database";

/// The `database` configuration block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the connection used when none is given
    pub default: String,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

impl DatabaseConfig {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            connections: HashMap::new(),
        }
    }

    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }
}

/// Lazily builds and caches named connections
pub struct DatabaseManager {
    config: DatabaseConfig,
    connections: DashMap<String, Arc<dyn ConnectionInterface>>,
}

impl DatabaseManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            connections: DashMap::new(),
        }
    }

    /// Read the `database` block from a loaded configuration
    pub fn from_configuration(manager: &ConfigurationManager) -> OrmResult<Self> {
        let config: DatabaseConfig = manager.get(DATABASE_CONFIG_KEY)?;
        tracing::debug!(
            default = %config.default,
            connections = config.connections.len(),
            "Loaded database configuration"
        );
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn default_connection_name(&self) -> &str {
        &self.config.default
    }

    /// The named connection, or the default one for `None`
    pub fn connection(&self, name: Option<&str>) -> OrmResult<Arc<dyn ConnectionInterface>> {
        let name = name.unwrap_or(&self.config.default);
        if let Some(conn) = self.connections.get(name) {
            return Ok(conn.value().clone());
        }

        let config = self.config.connections.get(name).cloned().ok_or_else(|| {
            ModelError::Configuration(format!("Database connection [{}] not configured", name))
        })?;

        let conn = self
            .connections
            .entry(name.to_string())
            .or_try_insert_with(|| build_connection(name, config))?
            .value()
            .clone();
        Ok(conn)
    }

    /// Names of connections built so far
    pub fn active_connections(&self) -> Vec<String> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Disconnect a connection and forget it so the next request rebuilds it
    pub async fn purge(&self, name: Option<&str>) -> OrmResult<()> {
        let name = name.unwrap_or(&self.config.default).to_string();
        if let Some((_, conn)) = self.connections.remove(&name) {
            conn.disconnect().await?;
        }
        Ok(())
    }

    /// Close the underlying handle but keep the connection cached; it
    /// reopens on next use
    pub async fn disconnect(&self, name: Option<&str>) -> OrmResult<()> {
        let name = name.unwrap_or(&self.config.default);
        let conn = self.connections.get(name).map(|entry| entry.value().clone());
        if let Some(conn) = conn {
            conn.disconnect().await?;
        }
        Ok(())
    }

    pub async fn disconnect_all(&self) -> OrmResult<()> {
        let all: Vec<_> = self.connections.iter().map(|entry| entry.value().clone()).collect();
        for conn in all {
            conn.disconnect().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DatabaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("default", &self.config.default)
            .field("active", &self.active_connections())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> DatabaseManager {
        let config = ConfigurationManager::from_value(json!({
            "database": {
                "default": "main",
                "connections": {
                    "main": { "driver": "sqlite", "database": ":memory:" },
                    "pooled": { "driver": "sqlite", "database": ":memory:", "use_pool": true, "pool": { "size": 2 } },
                    "legacy": { "driver": "oracle", "database": "x" }
                }
            }
        }))
        .unwrap();
        DatabaseManager::from_configuration(&config).unwrap()
    }

    #[test]
    fn test_connections_are_cached() {
        let manager = manager();
        let first = manager.connection(None).unwrap();
        let second = manager.connection(Some("main")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.active_connections(), vec!["main".to_string()]);
    }

    #[test]
    fn test_missing_and_invalid_connections() {
        let manager = manager();
        assert!(matches!(manager.connection(Some("nope")), Err(ModelError::Configuration(_))));
        assert!(matches!(manager.connection(Some("legacy")), Err(ModelError::Configuration(_))));
        assert!(manager.active_connections().is_empty());
    }

    #[test]
    fn test_pooled_entry_builds_pool() {
        let manager = manager();
        let conn = manager.connection(Some("pooled")).unwrap();
        assert_eq!(conn.name(), "pooled");
        assert!(conn.config().use_pool);
    }

    #[test]
    fn test_missing_database_block() {
        let config = ConfigurationManager::new();
        assert!(matches!(
            DatabaseManager::from_configuration(&config),
            Err(ModelError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_rebuilds() {
        let manager = manager();
        let first = manager.connection(None).unwrap();
        manager.purge(None).await.unwrap();
        let second = manager.connection(None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
