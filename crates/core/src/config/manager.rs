//! Keyed configuration tree
//!
//! Values are stored as one JSON document so that any section can be pulled
//! out and deserialized into the strongly typed struct that owns it
//! (for example the ORM's `DatabaseConfig` under the `database` key).

use crate::config::{ConfigError, ConfigSource, Environment};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Prefix for environment variables that override file values.
///
/// `EMPORIUM__DATABASE__CONNECTIONS__MAIN__HOST=db1` sets
/// `database.connections.main.host`.
pub const ENV_PREFIX: &str = "EMPORIUM__";

/// Configuration source consumed by the data layer
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    root: Value,
    sources: HashMap<String, ConfigSource>,
    environment: Environment,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            sources: HashMap::new(),
            environment: Environment::default(),
        }
    }

    /// Create a configuration from an already-built JSON tree
    pub fn from_value(root: Value) -> Result<Self, ConfigError> {
        if !root.is_object() {
            return Err(ConfigError::invalid_value("<root>", root.to_string(), "a mapping"));
        }
        Ok(Self {
            root,
            sources: HashMap::new(),
            environment: Environment::default(),
        })
    }

    /// Set the environment this configuration belongs to
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Load a YAML or JSON file and deep-merge it over the current tree
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path)?;

        let parsed: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            _ => return Err(ConfigError::UnsupportedFormat { path: display }),
        };

        if !parsed.is_object() {
            return Err(ConfigError::invalid_value(display, "non-mapping document", "a mapping at the top level"));
        }

        let mut leaves = Vec::new();
        collect_leaf_keys(&parsed, String::new(), &mut leaves);
        for key in leaves {
            self.sources.insert(key, ConfigSource::File(display.clone()));
        }

        merge(&mut self.root, parsed);
        let file = display.as_str();
        tracing::debug!(file = %file, "Configuration file loaded");
        Ok(())
    }

    /// Builder form of [`load_file`](Self::load_file)
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        self.load_file(path)?;
        Ok(self)
    }

    /// Apply `EMPORIUM__`-prefixed overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> usize {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from an arbitrary set of `(variable, value)` pairs.
    ///
    /// Variables without the `EMPORIUM__` prefix are ignored. Values that
    /// parse as JSON scalars or arrays (`5432`, `true`, `["a","b"]`) keep that
    /// type, everything else is stored as a string.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = 0;
        for (name, raw) in vars {
            let name = name.as_ref();
            let Some(path) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }

            let key = path
                .split("__")
                .map(|segment| segment.to_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            let value = serde_json::from_str::<Value>(raw.as_ref())
                .ok()
                .filter(|v| !v.is_object())
                .unwrap_or_else(|| Value::String(raw.as_ref().to_string()));

            insert_path(&mut self.root, &key, value);
            self.sources.insert(key.clone(), ConfigSource::EnvVar(name.to_string()));
            tracing::debug!(key = %key, variable = %name, "Configuration override applied");
            applied += 1;
        }
        applied
    }

    /// Set a value at a dotted key
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        insert_path(&mut self.root, key, value.into());
        self.sources.insert(key.to_string(), ConfigSource::Programmatic);
    }

    /// Raw JSON value at a dotted key
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        if key.is_empty() {
            return Some(&self.root);
        }
        key.split('.').try_fold(&self.root, |node, segment| node.get(segment))
    }

    pub fn has(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Deserialize the value at a dotted key into `T`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.get_value(key).ok_or_else(|| {
            ConfigError::missing_required(key, format!("Add '{}' to a configuration file or set {}", key, env_name(key)))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::Deserialize {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Deserialize the value at `key`, or return `default` when it is absent
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        if self.has(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Where the value at `key` was last set from
    pub fn source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }
}

fn env_name(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.replace('.', "__").to_uppercase())
}

fn insert_path(root: &mut Value, key: &str, value: Value) {
    let mut node = root;
    let mut segments = key.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn collect_leaf_keys(value: &Value, prefix: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_leaf_keys(child, path, out);
            }
        }
        _ => out.push(prefix),
    }
}
