//! Core Database Backend Traits
//!
//! Defines the driver seam the connection layer is written against and the
//! SQL dialect differences the grammar needs to know about.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backends::DatabaseBackendType;
use crate::connection::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::result::Row;
use crate::security;
use crate::value::{Value, DATETIME_FORMAT};

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Engine-reported id of the last inserted row, where the engine
    /// reports one on the statement itself (MySQL, SQLite)
    pub last_insert_id: Option<i64>,
}

/// A single physical database connection
#[async_trait]
pub trait DatabaseConnection: Send {
    fn backend_type(&self) -> DatabaseBackendType;

    /// Execute a prepared statement and return affected rows
    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult>;

    /// Execute a prepared statement and return all result rows
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Execute a statement without preparing it (transaction control)
    async fn execute_unprepared(&mut self, sql: &str) -> OrmResult<()>;

    /// Round-trip to check the connection is alive
    async fn ping(&mut self) -> OrmResult<()>;

    /// Close the connection gracefully
    async fn close(self: Box<Self>) -> OrmResult<()>;
}

/// Open a physical connection for the configured driver
pub async fn open_connection(config: &ConnectionConfig) -> OrmResult<Box<dyn DatabaseConnection>> {
    let backend = config.backend_type()?;
    tracing::debug!(driver = %backend, database = %config.database, "Opening database connection");

    let conn: Box<dyn DatabaseConnection> = match backend {
        DatabaseBackendType::PostgreSQL => Box::new(super::postgres::PostgresConnection::connect(config).await?),
        DatabaseBackendType::MySQL => Box::new(super::mysql::MySqlConnection::connect(config).await?),
        DatabaseBackendType::SQLite => Box::new(super::sqlite::SqliteConnection::connect(config).await?),
    };
    Ok(conn)
}

/// Convert decoded sqlx rows into result rows sharing one column list
pub(crate) fn collect_rows<R, F>(rows: Vec<R>, decode: F) -> OrmResult<Vec<Row>>
where
    R: sqlx::Row,
    F: Fn(&R, usize) -> OrmResult<Value>,
{
    use sqlx::Column;

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first.columns().iter().map(|c| c.name().to_string()).collect();

    rows.iter()
        .map(|row| {
            let values = (0..columns.len())
                .map(|index| decode(row, index))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

pub(crate) fn decode_error(column: usize, type_name: &str, err: sqlx::Error) -> ModelError {
    ModelError::Query(format!("Failed to decode column {} of type {}: {}", column, type_name, err))
}

pub(crate) fn connect_error(backend: DatabaseBackendType, err: sqlx::Error) -> ModelError {
    match ModelError::from(err) {
        ModelError::Configuration(msg) => ModelError::Configuration(msg),
        other => ModelError::Connection(format!("Could not connect to {}: {}", backend, other)),
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL => '`',
            SqlDialect::SQLite => '"',
        }
    }

    /// Sanitize and quote an identifier for this dialect
    pub fn wrap(&self, identifier: &str) -> OrmResult<String> {
        security::wrap_identifier(identifier, self.identifier_quote())
    }

    /// Whether `INSERT ... RETURNING` is used to read generated keys
    pub fn supports_returning(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL)
    }

    /// `LIMIT` clause to pair with an `OFFSET` when no limit was requested
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            SqlDialect::PostgreSQL => None,
            SqlDialect::MySQL => Some("LIMIT 18446744073709551615"),
            SqlDialect::SQLite => Some("LIMIT -1"),
        }
    }

    pub fn begin_transaction_sql(&self) -> &'static str {
        match self {
            SqlDialect::MySQL => "START TRANSACTION",
            SqlDialect::PostgreSQL | SqlDialect::SQLite => "BEGIN",
        }
    }

    /// `INSERT` of a row with no explicit columns
    pub fn insert_default_values(&self, table: &str) -> String {
        match self {
            SqlDialect::MySQL => format!("INSERT INTO {} () VALUES ()", table),
            SqlDialect::PostgreSQL | SqlDialect::SQLite => format!("INSERT INTO {} DEFAULT VALUES", table),
        }
    }

    /// Render a value as a SQL literal. Only for logging and debugging;
    /// statements always bind values as parameters.
    pub fn quote_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                SqlDialect::PostgreSQL => if *b { "TRUE" } else { "FALSE" }.to_string(),
                SqlDialect::MySQL | SqlDialect::SQLite => if *b { "1" } else { "0" }.to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => quote_string(s),
            Value::Json(j) => quote_string(&j.to_string()),
            Value::DateTime(dt) => quote_string(&dt.format(DATETIME_FORMAT).to_string()),
            Value::Bytes(b) => match self {
                SqlDialect::PostgreSQL => format!("'\\x{}'", hex::encode(b)),
                SqlDialect::MySQL | SqlDialect::SQLite => format!("X'{}'", hex::encode(b)),
            },
        }
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(4), "$5");
        assert_eq!(SqlDialect::MySQL.parameter_placeholder(4), "?");
    }

    #[test]
    fn test_quote_value() {
        assert_eq!(SqlDialect::SQLite.quote_value(&Value::from("O'Brien")), "'O''Brien'");
        assert_eq!(SqlDialect::PostgreSQL.quote_value(&Value::Bool(true)), "TRUE");
        assert_eq!(SqlDialect::MySQL.quote_value(&Value::Bool(true)), "1");
        assert_eq!(SqlDialect::SQLite.quote_value(&Value::Bytes(vec![0xde, 0xad])), "X'dead'");
        assert_eq!(SqlDialect::MySQL.quote_value(&Value::Null), "NULL");
    }

    #[test]
    fn test_dialect_wrap() {
        assert_eq!(SqlDialect::MySQL.wrap("orders.total").unwrap(), "`orders`.`total`");
        assert!(SqlDialect::SQLite.wrap("total; --").is_err());
    }
}
