//! Single physical connection

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

use super::config::ConnectionConfig;
use super::interface::ConnectionInterface;
use super::query_log::QueryLog;
use crate::backends::{open_connection, DatabaseConnection, SqlDialect};
use crate::error::{ModelError, OrmResult};
use crate::result::ResultSet;
use crate::value::Value;

type Handle = Option<Box<dyn DatabaseConnection>>;

/// One driver handle, opened lazily on first use and serialized behind an
/// async mutex. Transaction state belongs to this handle.
pub struct Connection {
    name: String,
    config: ConnectionConfig,
    dialect: SqlDialect,
    handle: Mutex<Handle>,
    connected: AtomicBool,
    in_transaction: AtomicBool,
    last_insert_id: AtomicI64,
    log: Arc<QueryLog>,
}

impl Connection {
    /// Validate the config and build an unopened connection
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> OrmResult<Self> {
        let log = Arc::new(QueryLog::new(config.enhanced));
        Self::with_query_log(name, config, log)
    }

    pub(crate) fn with_query_log(
        name: impl Into<String>,
        config: ConnectionConfig,
        log: Arc<QueryLog>,
    ) -> OrmResult<Self> {
        let dialect = config.backend_type()?.dialect();
        Ok(Self {
            name: name.into(),
            config,
            dialect,
            handle: Mutex::new(None),
            connected: AtomicBool::new(false),
            in_transaction: AtomicBool::new(false),
            last_insert_id: AtomicI64::new(0),
            log,
        })
    }

    /// Lock the handle, opening it first if needed
    async fn handle(&self) -> OrmResult<MutexGuard<'_, Handle>> {
        let mut guard = self.handle.lock().await;
        if guard.is_none() {
            *guard = Some(open_connection(&self.config).await?);
            self.connected.store(true, Ordering::SeqCst);
            tracing::debug!(connection = %self.name, "Database connection opened");
        }
        Ok(guard)
    }

    fn not_connected(&self) -> ModelError {
        ModelError::Connection(format!("Connection [{}] is not open", self.name))
    }

    fn finish<T>(&self, sql: &str, bindings: &[Value], started: Instant, result: OrmResult<T>) -> OrmResult<T> {
        match &result {
            Ok(_) => self.log.record(&self.name, sql, bindings, started.elapsed()),
            Err(e) => tracing::warn!(connection = %self.name, sql, error = %e, "Statement failed"),
        }
        result
    }

    fn remember_insert_id(&self, id: Option<i64>) {
        if let Some(id) = id {
            self.last_insert_id.store(id, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ConnectionInterface for Connection {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn query_logger(&self) -> &QueryLog {
        &self.log
    }

    async fn connect(&self) -> OrmResult<()> {
        let mut guard = self.handle().await?;
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        conn.ping().await
    }

    async fn disconnect(&self) -> OrmResult<()> {
        let mut guard = self.handle.lock().await;
        self.in_transaction.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(conn) = guard.take() {
            tracing::debug!(connection = %self.name, "Closing database connection");
            conn.close().await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn query(&self, sql: &str, bindings: &[Value]) -> OrmResult<ResultSet> {
        let mut guard = self.handle().await?;
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        let started = Instant::now();
        let result = conn.fetch_all(sql, bindings).await.map(ResultSet::new);
        self.finish(sql, bindings, started, result)
    }

    async fn execute(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        let mut guard = self.handle().await?;
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        let started = Instant::now();
        let result = conn.execute(sql, bindings).await;
        if let Ok(exec) = &result {
            self.remember_insert_id(exec.last_insert_id);
        }
        self.finish(sql, bindings, started, result.map(|exec| exec.rows_affected))
    }

    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<i64>> {
        let mut guard = self.handle().await?;
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        let started = Instant::now();

        let result = if self.dialect.supports_returning() {
            conn.fetch_all(sql, bindings)
                .await
                .map(|rows| rows.first().and_then(|row| row.get_index(0)).and_then(Value::as_i64))
        } else {
            conn.execute(sql, bindings).await.map(|exec| exec.last_insert_id)
        };
        if let Ok(id) = &result {
            self.remember_insert_id(*id);
        }
        self.finish(sql, bindings, started, result)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<()> {
        let mut guard = self.handle().await?;
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        let started = Instant::now();
        let result = conn.execute_unprepared(sql).await;
        self.finish(sql, &[], started, result)
    }

    async fn begin_transaction(&self) -> OrmResult<bool> {
        let mut guard = self.handle().await?;
        if self.in_transaction.load(Ordering::SeqCst) {
            tracing::debug!(connection = %self.name, "Transaction already open; not nesting");
            return Ok(false);
        }
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        conn.execute_unprepared(self.dialect.begin_transaction_sql())
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        self.in_transaction.store(true, Ordering::SeqCst);
        tracing::debug!(connection = %self.name, "Transaction started");
        Ok(true)
    }

    async fn commit(&self) -> OrmResult<()> {
        let mut guard = self.handle().await?;
        if !self.in_transaction.load(Ordering::SeqCst) {
            return Err(ModelError::Transaction("No active transaction to commit".to_string()));
        }
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        conn.execute_unprepared("COMMIT")
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))?;
        self.in_transaction.store(false, Ordering::SeqCst);
        tracing::debug!(connection = %self.name, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        let mut guard = self.handle().await?;
        if !self.in_transaction.load(Ordering::SeqCst) {
            return Err(ModelError::Transaction("No active transaction to roll back".to_string()));
        }
        let conn = guard.as_mut().ok_or_else(|| self.not_connected())?;
        let result = conn.execute_unprepared("ROLLBACK").await;
        self.in_transaction.store(false, Ordering::SeqCst);
        result.map_err(|e| ModelError::Transaction(format!("Failed to roll back transaction: {}", e)))?;
        tracing::debug!(connection = %self.name, "Transaction rolled back");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    async fn last_insert_id(&self, sequence: Option<&str>) -> OrmResult<Option<i64>> {
        if self.dialect == SqlDialect::PostgreSQL {
            let row = match sequence {
                Some(seq) => self.select_one("SELECT currval(CAST($1 AS regclass))", &[Value::from(seq)]).await?,
                None => self.select_one("SELECT lastval()", &[]).await?,
            };
            return Ok(row.and_then(|r| r.get_index(0).and_then(Value::as_i64)));
        }
        let id = self.last_insert_id.load(Ordering::SeqCst);
        Ok((id > 0).then_some(id))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("driver", &self.config.driver)
            .field("connected", &self.is_connected())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver_rejected_at_construction() {
        let err = Connection::new("legacy", ConnectionConfig::new("oracle", "shop")).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_lazy_open_and_nested_begin() {
        let conn = Connection::new("main", ConnectionConfig::sqlite(":memory:")).unwrap();
        assert!(!conn.is_connected());

        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[]).await.unwrap();
        assert!(conn.is_connected());

        assert!(conn.begin_transaction().await.unwrap());
        assert!(!conn.begin_transaction().await.unwrap());
        let id = conn.insert_get_id("INSERT INTO t (name) VALUES (?)", &[Value::from("a")]).await.unwrap();
        assert_eq!(id, Some(1));
        conn.rollback().await.unwrap();
        assert!(!conn.in_transaction());

        let rows = conn.query("SELECT COUNT(*) AS n FROM t", &[]).await.unwrap();
        assert_eq!(rows.first().and_then(|r| r.get("n")).and_then(Value::as_i64), Some(0));
        assert!(conn.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_commit_stays_open_until_rolled_back() {
        let conn = Connection::new("main", ConnectionConfig::sqlite(":memory:")).unwrap();
        conn.unprepared("PRAGMA foreign_keys = ON").await.unwrap();
        conn.unprepared("CREATE TABLE parents (id INTEGER PRIMARY KEY)").await.unwrap();
        conn.unprepared(
            "CREATE TABLE children (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER REFERENCES parents(id) DEFERRABLE INITIALLY DEFERRED
             )",
        )
        .await
        .unwrap();

        assert!(conn.begin_transaction().await.unwrap());
        conn.execute("INSERT INTO children (parent_id) VALUES (?)", &[Value::Int(9)]).await.unwrap();
        assert!(matches!(conn.commit().await, Err(ModelError::Transaction(_))));
        assert!(conn.in_transaction());

        conn.rollback().await.unwrap();
        assert!(!conn.in_transaction());
        assert!(conn.begin_transaction().await.unwrap());
        conn.rollback().await.unwrap();
    }
}
