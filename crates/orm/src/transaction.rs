//! Transaction Management
//!
//! Runs a closure inside a transaction with commit on success and rollback
//! on error. Pooled connections are pinned to one lease for the duration.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backends::SqlDialect;
use crate::connection::ConnectionInterface;
use crate::error::{ModelError, ModelResult};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Convert to SQL string for SET TRANSACTION ISOLATION LEVEL command
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction configuration options
#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Isolation level; `None` keeps the server default. Ignored on SQLite.
    pub isolation_level: Option<IsolationLevel>,
    /// Whether the transaction is read-only. Ignored on SQLite.
    pub read_only: bool,
    /// Total attempts. Only concurrency failures (deadlocks, serialization
    /// failures, lock timeouts) are retried.
    pub attempts: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            isolation_level: None,
            read_only: false,
            attempts: 1,
        }
    }
}

impl TransactionConfig {
    pub fn serializable() -> Self {
        Self {
            isolation_level: Some(IsolationLevel::Serializable),
            ..Default::default()
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// `SET TRANSACTION ...` for the configured characteristics, if any
    fn characteristics_sql(&self) -> Option<String> {
        let mut modes = Vec::new();
        if let Some(level) = self.isolation_level {
            modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        if self.read_only {
            modes.push("READ ONLY".to_string());
        }
        (!modes.is_empty()).then(|| format!("SET TRANSACTION {}", modes.join(", ")))
    }
}

/// Execute a closure within a transaction scope with automatic commit/rollback
///
/// - If the closure succeeds, the transaction is committed
/// - If the closure fails, the transaction is rolled back and the error returned
/// - If a transaction is already open on the connection, the closure joins it
///   and the outer scope decides commit or rollback
pub async fn transaction<F, Fut, R>(
    conn: &Arc<dyn ConnectionInterface>,
    config: TransactionConfig,
    f: F,
) -> ModelResult<R>
where
    F: Fn(Arc<dyn ConnectionInterface>) -> Fut,
    Fut: Future<Output = ModelResult<R>>,
{
    let max_attempts = config.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("Starting transaction attempt {} of {}", attempt, max_attempts);

        let tx_conn = match conn.acquire_dedicated().await? {
            Some(dedicated) => dedicated,
            None => conn.clone(),
        };

        if tx_conn.in_transaction() {
            debug!("Joining transaction already open on [{}]", tx_conn.name());
            return f(tx_conn).await;
        }

        let characteristics = config.characteristics_sql();
        let dialect = tx_conn.dialect();
        if let (Some(sql), SqlDialect::MySQL) = (&characteristics, dialect) {
            tx_conn.unprepared(sql).await?;
        }
        if !tx_conn.begin_transaction().await? {
            return f(tx_conn).await;
        }
        if let (Some(sql), SqlDialect::PostgreSQL) = (&characteristics, dialect) {
            if let Err(e) = tx_conn.unprepared(sql).await {
                rollback_quietly(&tx_conn).await;
                return Err(e);
            }
        }

        // a failed COMMIT may leave the transaction open, so it rolls back too
        let outcome = match f(tx_conn.clone()).await {
            Ok(result) => tx_conn.commit().await.map(|()| result),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => return Ok(result),
            Err(e) => {
                rollback_quietly(&tx_conn).await;
                if attempt < max_attempts && is_concurrency_failure(&e) {
                    warn!("Concurrency failure on attempt {}, retrying: {}", attempt, e);
                    continue;
                }
                return Err(e);
            }
        }
    }
}

/// Execute a closure within a default transaction scope
pub async fn transaction_default<F, Fut, R>(conn: &Arc<dyn ConnectionInterface>, f: F) -> ModelResult<R>
where
    F: Fn(Arc<dyn ConnectionInterface>) -> Fut,
    Fut: Future<Output = ModelResult<R>>,
{
    transaction(conn, TransactionConfig::default(), f).await
}

async fn rollback_quietly(conn: &Arc<dyn ConnectionInterface>) {
    warn!("Rolling back transaction on [{}] after error", conn.name());
    if let Err(e) = conn.rollback().await {
        warn!("Rollback failed on [{}]: {}", conn.name(), e);
    }
}

/// Check if an error represents a concurrency failure that can be retried
pub fn is_concurrency_failure(error: &ModelError) -> bool {
    match error {
        ModelError::Query(msg) | ModelError::Transaction(msg) => {
            let msg = msg.to_ascii_lowercase();
            msg.contains("40001") // serialization_failure
                || msg.contains("40p01") // deadlock_detected
                || msg.contains("could not serialize access")
                || msg.contains("deadlock")
                || msg.contains("lock wait timeout")
                || msg.contains("database is locked")
        }
        _ => false,
    }
}
