//! The connection seam the query builder and models are written against

use async_trait::async_trait;
use std::sync::Arc;

use super::config::ConnectionConfig;
use super::query_log::{QueryLog, QueryLogEntry};
use crate::backends::SqlDialect;
use crate::error::OrmResult;
use crate::result::{ResultSet, Row};
use crate::value::Value;

/// A logical database connection.
///
/// Implemented by a single [`Connection`](super::Connection), a
/// [`ReadWriteConnection`](super::ReadWriteConnection), a
/// [`ConnectionPool`](super::ConnectionPool) and the
/// [`PoolLease`](super::PoolLease) it hands out. Every call awaits its
/// round-trip before returning.
#[async_trait]
pub trait ConnectionInterface: Send + Sync {
    /// Name of the configuration entry this connection was built from
    fn name(&self) -> &str;

    fn config(&self) -> &ConnectionConfig;

    fn dialect(&self) -> SqlDialect;

    fn query_logger(&self) -> &QueryLog;

    /// Open the underlying handle now instead of on first use
    async fn connect(&self) -> OrmResult<()>;

    async fn disconnect(&self) -> OrmResult<()>;

    fn is_connected(&self) -> bool;

    /// Run a statement that returns rows
    async fn query(&self, sql: &str, bindings: &[Value]) -> OrmResult<ResultSet>;

    /// Run a statement and return the number of affected rows
    async fn execute(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64>;

    /// Run an INSERT and return the generated key. On PostgreSQL `sql` must
    /// carry a `RETURNING` clause; elsewhere the engine-reported id is used.
    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<i64>>;

    /// Run a statement outside the prepared-statement protocol
    async fn unprepared(&self, sql: &str) -> OrmResult<()>;

    /// Start a transaction. Returns `false` without doing anything when one
    /// is already open; transactions do not nest.
    async fn begin_transaction(&self) -> OrmResult<bool>;

    async fn commit(&self) -> OrmResult<()>;

    async fn rollback(&self) -> OrmResult<()>;

    fn in_transaction(&self) -> bool;

    /// Id generated by the most recent insert on this connection. With a
    /// sequence name PostgreSQL asks the sequence directly.
    async fn last_insert_id(&self, sequence: Option<&str>) -> OrmResult<Option<i64>>;

    /// A connection pinned for exclusive use, for work that must stay on one
    /// physical session (transactions). `None` means `self` already is one.
    async fn acquire_dedicated(&self) -> OrmResult<Option<Arc<dyn ConnectionInterface>>> {
        Ok(None)
    }

    async fn select_one(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<Row>> {
        Ok(self.query(sql, bindings).await?.into_rows().into_iter().next())
    }

    /// Render a value as a SQL literal, for logging only
    fn quote(&self, value: &Value) -> String {
        self.dialect().quote_value(value)
    }

    fn enable_query_log(&self) {
        self.query_logger().enable();
    }

    fn disable_query_log(&self) {
        self.query_logger().disable();
    }

    fn query_log(&self) -> Vec<QueryLogEntry> {
        self.query_logger().entries()
    }

    fn flush_query_log(&self) -> Vec<QueryLogEntry> {
        self.query_logger().flush()
    }
}

/// A statement with its bindings, ready to run on a connection
pub struct Statement<'c> {
    connection: &'c dyn ConnectionInterface,
    sql: String,
    bindings: Vec<Value>,
}

impl<'c> Statement<'c> {
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.bindings.push(value.into());
        self
    }

    pub fn bind_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.bindings.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub async fn execute(&self) -> OrmResult<u64> {
        self.connection.execute(&self.sql, &self.bindings).await
    }

    pub async fn query(&self) -> OrmResult<ResultSet> {
        self.connection.query(&self.sql, &self.bindings).await
    }

    pub async fn first(&self) -> OrmResult<Option<Row>> {
        self.connection.select_one(&self.sql, &self.bindings).await
    }
}

impl dyn ConnectionInterface {
    /// Prepare `sql` for execution with bindings added via [`Statement::bind`]
    pub fn prepare(&self, sql: impl Into<String>) -> Statement<'_> {
        Statement {
            connection: self,
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}
