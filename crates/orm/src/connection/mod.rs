//! Connection Management
//!
//! The [`ConnectionInterface`] seam and its three shapes: a single lazily
//! opened connection, a read/write split, and a pool of exclusive leases.

pub mod config;
pub mod interface;
pub mod pool;
pub mod query_log;
pub mod read_write;
pub mod single;

// Re-export for convenience
pub use config::*;
pub use interface::*;
pub use pool::*;
pub use query_log::*;
pub use read_write::*;
pub use single::*;

use std::sync::Arc;

use crate::error::OrmResult;

/// Build the connection shape a config entry asks for
pub fn build_connection(name: &str, config: ConnectionConfig) -> OrmResult<Arc<dyn ConnectionInterface>> {
    let conn: Arc<dyn ConnectionInterface> = if config.use_pool {
        if config.has_read_write_split() {
            tracing::warn!(connection = name, "read/write split is ignored for pooled connections");
        }
        Arc::new(ConnectionPool::new(name, config)?)
    } else if config.has_read_write_split() {
        Arc::new(ReadWriteConnection::new(name, config)?)
    } else {
        Arc::new(Connection::new(name, config)?)
    };
    Ok(conn)
}
