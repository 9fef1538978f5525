//! # emporium-orm: Active Record data layer
//!
//! Connections to MySQL, PostgreSQL and SQLite behind one
//! [`ConnectionInterface`], a fluent [`QueryBuilder`] that keeps bindings in
//! placeholder order, and [`Model`]s with dirty tracking, casts, lifecycle
//! observers, soft deletes and eager-loaded relationships.
//!
//! ```ignore
//! let manager = Arc::new(DatabaseManager::new(config));
//! let ctx = ModelContext::from_manager(manager)?;
//!
//! let orders = Order::query(&ctx)?
//!     .where_("status", "paid")
//!     .with(&["items.product"])
//!     .paginate(20, 1)
//!     .await?;
//! ```

pub mod backends;
pub mod collection;
pub mod connection;
pub mod error;
pub mod event_error;
pub mod events;
pub mod manager;
pub mod model;
pub mod observers;
pub mod pagination;
pub mod query;
pub mod relationships;
pub mod result;
pub mod security;
pub mod transaction;
pub mod value;


pub use backends::{DatabaseBackendType, SqlDialect};
pub use collection::Collection;
pub use connection::{
    build_connection, Connection, ConnectionConfig, ConnectionInterface, ConnectionPool, PoolError, PoolLease,
    PoolSettings, PoolStats, QueryLogEntry, ReadWriteConnection,
};
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use event_error::EventError;
pub use events::{ModelEvent, ModelObserver};
pub use manager::{DatabaseConfig, DatabaseManager};
pub use model::{
    attributes, Builder, CastType, KeyType, Model, ModelContext, ModelDefinition, ModelQueries, ModelSchema,
    MorphMap, Resolved, TrashedScope,
};
pub use observers::EventDispatcher;
pub use pagination::{PageLink, Paginator};
pub use query::QueryBuilder;
pub use relationships::{Related, Relation, RelationKind, SyncChanges};
pub use result::{ResultSet, Row};
pub use transaction::{transaction, transaction_default, IsolationLevel, TransactionConfig};
pub use value::Value;
