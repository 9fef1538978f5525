//! Error types for the ORM system
//!
//! One error enum is shared by the connection layer, the query builder and
//! the model layer so that `?` works across all of them.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Unknown driver, missing named connection, malformed connection config
    Configuration(String),
    /// Network or authentication failure, pool exhaustion or timeout
    Connection(String),
    /// The database engine rejected a statement
    Query(String),
    /// Invalid input caught before any SQL was sent
    Validation(String),
    /// `find_or_fail` / `first_or_fail` matched nothing
    NotFound { model: String, keys: Vec<String> },
    /// A relation was requested that the model does not define, or was used
    /// in a way its kind does not support
    RelationshipContract(String),
    /// Primary key is missing or invalid
    MissingPrimaryKey,
    /// Transaction error
    Transaction(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// An observer failed
    Event(String),
}

impl ModelError {
    pub fn not_found(model: impl Into<String>, keys: Vec<String>) -> Self {
        ModelError::NotFound {
            model: model.into(),
            keys,
        }
    }

    /// Wrap a driver error together with the statement that caused it
    pub(crate) fn from_sqlx(err: sqlx::Error, sql: &str) -> Self {
        match ModelError::from(err) {
            ModelError::Query(msg) => ModelError::Query(format!("{} (SQL: {})", msg, sql)),
            other => other,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::NotFound { model, keys } => {
                if keys.is_empty() {
                    write!(f, "No query results for model [{}]", model)
                } else {
                    write!(f, "No query results for model [{}] {}", model, keys.join(", "))
                }
            }
            ModelError::RelationshipContract(msg) => write!(f, "Relationship error: {}", msg),
            ModelError::MissingPrimaryKey => write!(f, "Primary key is missing or invalid"),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Event(msg) => write!(f, "Event error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => ModelError::Configuration(e.to_string()),
            sqlx::Error::Io(e) => ModelError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => ModelError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => ModelError::Connection("timed out acquiring a connection".to_string()),
            sqlx::Error::PoolClosed => ModelError::Connection("connection pool is closed".to_string()),
            sqlx::Error::WorkerCrashed => ModelError::Connection("database worker crashed".to_string()),
            sqlx::Error::Protocol(msg) => ModelError::Connection(msg),
            sqlx::Error::Database(db) => ModelError::Query(db.message().to_string()),
            other => ModelError::Query(other.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<emporium_core::ConfigError> for ModelError {
    fn from(err: emporium_core::ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}
