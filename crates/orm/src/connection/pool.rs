//! Connection Pool Management
//!
//! A fixed number of [`Connection`]s handed out as exclusive leases. Callers
//! wait when every connection is leased, up to the configured acquire
//! timeout. A lease returns its connection when dropped, on every path.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::ConnectionConfig;
use super::interface::ConnectionInterface;
use super::query_log::QueryLog;
use super::single::Connection;
use crate::backends::SqlDialect;
use crate::error::{ModelError, OrmResult};
use crate::result::ResultSet;
use crate::value::Value;

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Connection acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl From<PoolError> for ModelError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AcquisitionFailed(msg) => {
                ModelError::Connection(format!("Database connection failed: {}", msg))
            }
            PoolError::PoolClosed => ModelError::Connection("Database pool is closed".to_string()),
            PoolError::ConnectionTimeout { timeout_ms } => ModelError::Connection(format!(
                "Database connection timeout after {}ms",
                timeout_ms
            )),
            PoolError::ConfigurationError { message } => ModelError::Configuration(message),
        }
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub max_connections: u32,
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
    pub acquire_count: u64,
    pub acquire_errors: u64,
    pub created_at: Instant,
}

impl PoolStats {
    /// Calculate the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        if self.acquire_count > 0 {
            (self.acquire_errors as f64 / self.acquire_count as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Get pool utilization as a percentage (active / max)
    pub fn utilization(&self) -> f64 {
        if self.max_connections > 0 {
            (self.active_connections as f64 / self.max_connections as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }
}

struct PoolShared {
    name: String,
    config: ConnectionConfig,
    idle: Mutex<Vec<Connection>>,
    semaphore: Arc<Semaphore>,
    log: Arc<QueryLog>,
    created: AtomicU64,
    acquire_count: AtomicU64,
    acquire_errors: AtomicU64,
    last_insert_id: AtomicI64,
    created_at: Instant,
}

impl PoolShared {
    fn release(&self, conn: Connection) {
        if conn.in_transaction() {
            tracing::warn!(pool = %self.name, "Connection returned to pool with an open transaction");
        }
        match self.idle.lock() {
            Ok(mut idle) => idle.push(conn),
            Err(_) => {
                self.created.fetch_sub(1, Ordering::SeqCst);
                tracing::warn!(pool = %self.name, "Idle list poisoned; dropping connection");
            }
        }
    }

    fn take_idle(&self) -> Option<Connection> {
        self.idle.lock().ok().and_then(|mut idle| idle.pop())
    }
}

/// Managed pool of connections for one configuration entry
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
    dialect: SqlDialect,
}

impl ConnectionPool {
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> OrmResult<Self> {
        let dialect = config.backend_type()?.dialect();
        if config.pool.size == 0 {
            return Err(PoolError::ConfigurationError {
                message: "pool.size must be at least 1".to_string(),
            }
            .into());
        }
        let size = config.pool.size as usize;
        let log = Arc::new(QueryLog::new(config.enhanced));

        Ok(Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                idle: Mutex::new(Vec::with_capacity(size)),
                semaphore: Arc::new(Semaphore::new(size)),
                log,
                created: AtomicU64::new(0),
                acquire_count: AtomicU64::new(0),
                acquire_errors: AtomicU64::new(0),
                last_insert_id: AtomicI64::new(0),
                created_at: Instant::now(),
                config,
            }),
            dialect,
        })
    }

    pub fn max_connections(&self) -> u32 {
        self.shared.config.pool.size
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.shared.config.pool.acquire_timeout_ms)
    }

    /// Lease a connection, waiting up to the acquire timeout when all are in use
    pub async fn acquire(&self) -> Result<PoolLease, PoolError> {
        let shared = &self.shared;
        shared.acquire_count.fetch_add(1, Ordering::Relaxed);

        let timeout = self.acquire_timeout();
        let permit = match tokio::time::timeout(timeout, shared.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                shared.acquire_errors.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::PoolClosed);
            }
            Err(_) => {
                shared.acquire_errors.fetch_add(1, Ordering::Relaxed);
                let err = PoolError::ConnectionTimeout {
                    timeout_ms: shared.config.pool.acquire_timeout_ms,
                };
                tracing::warn!(pool = %shared.name, "Pool exhausted: {}", err);
                return Err(err);
            }
        };

        let conn = match shared.take_idle() {
            Some(conn) => {
                if conn.in_transaction() {
                    if let Err(e) = conn.rollback().await {
                        tracing::warn!(pool = %shared.name, error = %e, "Rollback of stale transaction failed");
                    }
                }
                conn
            }
            None => {
                let index = shared.created.fetch_add(1, Ordering::SeqCst);
                Connection::with_query_log(
                    format!("{}#{}", shared.name, index),
                    shared.config.clone(),
                    shared.log.clone(),
                )
                .map_err(|e| {
                    shared.created.fetch_sub(1, Ordering::SeqCst);
                    shared.acquire_errors.fetch_add(1, Ordering::Relaxed);
                    PoolError::AcquisitionFailed(e.to_string())
                })?
            }
        };

        let stats = self.stats();
        tracing::debug!(
            pool = %shared.name,
            "Database connection acquired (active: {}, idle: {})",
            stats.active_connections,
            stats.idle_connections
        );

        Ok(PoolLease {
            conn: Some(conn),
            shared: shared.clone(),
            dialect: self.dialect,
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        let max = shared.config.pool.size;
        let available = u32::try_from(shared.semaphore.available_permits()).unwrap_or(max);
        let idle = shared.idle.lock().map(|idle| idle.len() as u32).unwrap_or(0);
        PoolStats {
            max_connections: max,
            total_connections: shared.created.load(Ordering::SeqCst) as u32,
            idle_connections: idle,
            active_connections: max.saturating_sub(available),
            acquire_count: shared.acquire_count.load(Ordering::Relaxed),
            acquire_errors: shared.acquire_errors.load(Ordering::Relaxed),
            created_at: shared.created_at,
        }
    }

    /// Stop handing out leases and close idle connections
    pub async fn close(&self) -> OrmResult<()> {
        self.shared.semaphore.close();
        let idle: Vec<Connection> = self
            .shared
            .idle
            .lock()
            .map(|mut idle| std::mem::take(&mut *idle))
            .unwrap_or_default();
        for conn in idle {
            conn.disconnect().await?;
        }
        Ok(())
    }

    async fn lease(&self) -> OrmResult<PoolLease> {
        Ok(self.acquire().await?)
    }
}

#[async_trait]
impl ConnectionInterface for ConnectionPool {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn query_logger(&self) -> &QueryLog {
        &self.shared.log
    }

    async fn connect(&self) -> OrmResult<()> {
        self.lease().await?.connect().await
    }

    async fn disconnect(&self) -> OrmResult<()> {
        self.close().await
    }

    fn is_connected(&self) -> bool {
        !self.shared.semaphore.is_closed() && self.shared.created.load(Ordering::SeqCst) > 0
    }

    async fn query(&self, sql: &str, bindings: &[Value]) -> OrmResult<ResultSet> {
        self.lease().await?.query(sql, bindings).await
    }

    async fn execute(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        self.lease().await?.execute(sql, bindings).await
    }

    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<i64>> {
        let id = self.lease().await?.insert_get_id(sql, bindings).await?;
        if let Some(id) = id {
            self.shared.last_insert_id.store(id, Ordering::SeqCst);
        }
        Ok(id)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<()> {
        self.lease().await?.unprepared(sql).await
    }

    async fn begin_transaction(&self) -> OrmResult<bool> {
        Err(ModelError::Transaction(
            "A pool cannot hold a transaction; acquire a lease or use transaction()".to_string(),
        ))
    }

    async fn commit(&self) -> OrmResult<()> {
        Err(ModelError::Transaction("No active transaction to commit".to_string()))
    }

    async fn rollback(&self) -> OrmResult<()> {
        Err(ModelError::Transaction("No active transaction to roll back".to_string()))
    }

    fn in_transaction(&self) -> bool {
        false
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> OrmResult<Option<i64>> {
        let id = self.shared.last_insert_id.load(Ordering::SeqCst);
        Ok((id > 0).then_some(id))
    }

    async fn acquire_dedicated(&self) -> OrmResult<Option<Arc<dyn ConnectionInterface>>> {
        let lease: Arc<dyn ConnectionInterface> = Arc::new(self.lease().await?);
        Ok(Some(lease))
    }
}

/// Exclusive use of one pooled connection
pub struct PoolLease {
    conn: Option<Connection>,
    shared: Arc<PoolShared>,
    dialect: SqlDialect,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PoolLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolLease")
            .field("dialect", &self.dialect)
            .field("released", &self.conn.is_none())
            .finish_non_exhaustive()
    }
}

impl PoolLease {
    fn inner(&self) -> OrmResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| ModelError::Connection("Lease already released".to_string()))
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn);
        }
    }
}

#[async_trait]
impl ConnectionInterface for PoolLease {
    fn name(&self) -> &str {
        self.conn.as_ref().map(|c| c.name()).unwrap_or(self.shared.name.as_str())
    }

    fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn query_logger(&self) -> &QueryLog {
        &self.shared.log
    }

    async fn connect(&self) -> OrmResult<()> {
        self.inner()?.connect().await
    }

    async fn disconnect(&self) -> OrmResult<()> {
        self.inner()?.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.is_connected())
    }

    async fn query(&self, sql: &str, bindings: &[Value]) -> OrmResult<ResultSet> {
        self.inner()?.query(sql, bindings).await
    }

    async fn execute(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        self.inner()?.execute(sql, bindings).await
    }

    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<i64>> {
        let id = self.inner()?.insert_get_id(sql, bindings).await?;
        if let Some(id) = id {
            self.shared.last_insert_id.store(id, Ordering::SeqCst);
        }
        Ok(id)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<()> {
        self.inner()?.unprepared(sql).await
    }

    async fn begin_transaction(&self) -> OrmResult<bool> {
        self.inner()?.begin_transaction().await
    }

    async fn commit(&self) -> OrmResult<()> {
        self.inner()?.commit().await
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.inner()?.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.in_transaction())
    }

    async fn last_insert_id(&self, sequence: Option<&str>) -> OrmResult<Option<i64>> {
        self.inner()?.last_insert_id(sequence).await
    }
}
