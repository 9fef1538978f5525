//! Read/write split connection

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::ConnectionConfig;
use super::interface::ConnectionInterface;
use super::query_log::QueryLog;
use super::single::Connection;
use crate::backends::SqlDialect;
use crate::error::OrmResult;
use crate::result::ResultSet;
use crate::value::Value;

/// Sends writes to one host and reads to another.
///
/// Reads go to the writer while a transaction is open, after
/// [`use_write_connection_for_reads`](Self::use_write_connection_for_reads),
/// and, with `sticky`, once this connection has modified anything.
pub struct ReadWriteConnection {
    name: String,
    config: ConnectionConfig,
    read: Connection,
    write: Connection,
    records_modified: AtomicBool,
    force_write: AtomicBool,
    log: Arc<QueryLog>,
}

impl ReadWriteConnection {
    /// Build both sides. Read and write hosts are picked once, here.
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> OrmResult<Self> {
        let name = name.into();
        let log = Arc::new(QueryLog::new(config.enhanced));
        let read_config = config.read_config();
        let write_config = config.write_config();
        tracing::debug!(
            connection = %name,
            read_host = read_config.host.as_deref().unwrap_or("localhost"),
            write_host = write_config.host.as_deref().unwrap_or("localhost"),
            "Configured read/write split"
        );

        Ok(Self {
            read: Connection::with_query_log(format!("{}::read", name), read_config, log.clone())?,
            write: Connection::with_query_log(format!("{}::write", name), write_config, log.clone())?,
            name,
            config,
            records_modified: AtomicBool::new(false),
            force_write: AtomicBool::new(false),
            log,
        })
    }

    pub fn read_connection(&self) -> &Connection {
        &self.read
    }

    pub fn write_connection(&self) -> &Connection {
        &self.write
    }

    /// Route every subsequent read to the writer
    pub fn use_write_connection_for_reads(&self) {
        self.force_write.store(true, Ordering::SeqCst);
    }

    pub fn records_modified(&self) -> bool {
        self.records_modified.load(Ordering::SeqCst)
    }

    fn reader(&self) -> &Connection {
        let use_writer = self.force_write.load(Ordering::SeqCst)
            || self.write.in_transaction()
            || (self.config.sticky && self.records_modified());
        if use_writer {
            &self.write
        } else {
            &self.read
        }
    }

    fn mark_modified(&self) {
        self.records_modified.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionInterface for ReadWriteConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn dialect(&self) -> SqlDialect {
        self.write.dialect()
    }

    fn query_logger(&self) -> &QueryLog {
        &self.log
    }

    async fn connect(&self) -> OrmResult<()> {
        self.write.connect().await?;
        self.read.connect().await
    }

    async fn disconnect(&self) -> OrmResult<()> {
        let read = self.read.disconnect().await;
        self.write.disconnect().await?;
        read
    }

    fn is_connected(&self) -> bool {
        self.read.is_connected() || self.write.is_connected()
    }

    async fn query(&self, sql: &str, bindings: &[Value]) -> OrmResult<ResultSet> {
        self.reader().query(sql, bindings).await
    }

    async fn execute(&self, sql: &str, bindings: &[Value]) -> OrmResult<u64> {
        let affected = self.write.execute(sql, bindings).await?;
        if affected > 0 {
            self.mark_modified();
        }
        Ok(affected)
    }

    async fn insert_get_id(&self, sql: &str, bindings: &[Value]) -> OrmResult<Option<i64>> {
        let id = self.write.insert_get_id(sql, bindings).await?;
        self.mark_modified();
        Ok(id)
    }

    async fn unprepared(&self, sql: &str) -> OrmResult<()> {
        self.write.unprepared(sql).await
    }

    async fn begin_transaction(&self) -> OrmResult<bool> {
        self.write.begin_transaction().await
    }

    async fn commit(&self) -> OrmResult<()> {
        self.write.commit().await
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.write.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.write.in_transaction()
    }

    async fn last_insert_id(&self, sequence: Option<&str>) -> OrmResult<Option<i64>> {
        self.write.last_insert_id(sequence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::HostOverride;

    fn split_config(dir: &std::path::Path, sticky: bool) -> ConnectionConfig {
        let read = HostOverride {
            database: Some(dir.join("replica.db").to_string_lossy().into_owned()),
            ..Default::default()
        };
        let write = HostOverride {
            database: Some(dir.join("primary.db").to_string_lossy().into_owned()),
            ..Default::default()
        };
        ConnectionConfig::sqlite("unused.db").with_read_write(read, write, sticky)
    }

    async fn seed(conn: &Connection, label: &str) {
        conn.execute("CREATE TABLE IF NOT EXISTS origin (label TEXT)", &[]).await.unwrap();
        conn.execute("INSERT INTO origin (label) VALUES (?)", &[Value::from(label)]).await.unwrap();
    }

    async fn origin(conn: &ReadWriteConnection) -> String {
        let rows = conn.query("SELECT label FROM origin", &[]).await.unwrap();
        rows.first().and_then(|r| r.get("label")).and_then(Value::as_str).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_reads_go_to_replica_until_sticky_write() {
        let dir = tempfile::tempdir().unwrap();
        let conn = ReadWriteConnection::new("main", split_config(dir.path(), true)).unwrap();
        seed(conn.read_connection(), "replica").await;
        seed(conn.write_connection(), "primary").await;

        assert_eq!(origin(&conn).await, "replica");
        conn.execute("UPDATE origin SET label = ?", &[Value::from("primary")]).await.unwrap();
        assert!(conn.records_modified());
        assert_eq!(origin(&conn).await, "primary");
    }

    #[tokio::test]
    async fn test_non_sticky_reads_stay_on_replica() {
        let dir = tempfile::tempdir().unwrap();
        let conn = ReadWriteConnection::new("main", split_config(dir.path(), false)).unwrap();
        seed(conn.read_connection(), "replica").await;
        seed(conn.write_connection(), "primary").await;

        conn.execute("UPDATE origin SET label = ?", &[Value::from("primary")]).await.unwrap();
        assert_eq!(origin(&conn).await, "replica");

        conn.begin_transaction().await.unwrap();
        assert_eq!(origin(&conn).await, "primary");
        conn.rollback().await.unwrap();

        conn.use_write_connection_for_reads();
        assert_eq!(origin(&conn).await, "primary");
    }
}
