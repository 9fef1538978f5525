//! Connection configuration
//!
//! One [`ConnectionConfig`] per named entry under `database.connections`.

use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};

use crate::backends::DatabaseBackendType;
use crate::error::OrmResult;

/// Settings for a single named connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `pgsql`, `mysql` or `sqlite` (aliases accepted)
    pub driver: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Database name, or file path for SQLite (`:memory:` for in-memory)
    #[serde(default)]
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Overrides applied for the read side of a read/write split
    pub read: Option<HostOverride>,
    /// Overrides applied for the write side of a read/write split
    pub write: Option<HostOverride>,
    /// Route reads to the writer once this connection has written
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub use_pool: bool,
    #[serde(default)]
    pub pool: PoolSettings,
    /// Record every statement with its timing in the query log
    #[serde(default)]
    pub enhanced: bool,
}

/// Per-side overrides for a read/write split
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostOverride {
    /// One host, or several to pick from at random
    #[serde(default, deserialize_with = "one_or_many")]
    pub host: Vec<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_pool_size")]
    pub size: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_pool_size() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(host)) => vec![host],
        Some(OneOrMany::Many(hosts)) => hosts,
    })
}

impl ConnectionConfig {
    pub fn new(driver: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            host: None,
            port: None,
            database: database.into(),
            username: None,
            password: None,
            read: None,
            write: None,
            sticky: false,
            use_pool: false,
            pool: PoolSettings::default(),
            enhanced: false,
        }
    }

    /// SQLite database at `path`
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new("sqlite", path)
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_pool(mut self, size: u32) -> Self {
        self.use_pool = true;
        self.pool.size = size;
        self
    }

    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.pool.acquire_timeout_ms = timeout_ms;
        self
    }

    pub fn with_read_write(mut self, read: HostOverride, write: HostOverride, sticky: bool) -> Self {
        self.read = Some(read);
        self.write = Some(write);
        self.sticky = sticky;
        self
    }

    pub fn enhanced(mut self, enhanced: bool) -> Self {
        self.enhanced = enhanced;
        self
    }

    /// Parse the driver name. Unknown drivers are a configuration error.
    pub fn backend_type(&self) -> OrmResult<DatabaseBackendType> {
        self.driver.parse()
    }

    pub fn has_read_write_split(&self) -> bool {
        self.read.is_some() || self.write.is_some()
    }

    /// Config of the read side, with one host picked at random
    pub fn read_config(&self) -> ConnectionConfig {
        self.with_override(self.read.as_ref())
    }

    /// Config of the write side, with one host picked at random
    pub fn write_config(&self) -> ConnectionConfig {
        self.with_override(self.write.as_ref())
    }

    fn with_override(&self, side: Option<&HostOverride>) -> ConnectionConfig {
        let mut config = self.clone();
        config.read = None;
        config.write = None;

        let Some(side) = side else {
            return config;
        };
        if let Some(host) = side.host.choose(&mut rand::thread_rng()) {
            config.host = Some(host.clone());
        }
        if side.port.is_some() {
            config.port = side.port;
        }
        if let Some(database) = &side.database {
            config.database = database.clone();
        }
        if side.username.is_some() {
            config.username = side.username.clone();
        }
        if side.password.is_some() {
            config.password = side.password.clone();
        }
        config
    }
}
