//! SQLite Backend Implementation
//!
//! SQLite has no native boolean or date-time storage. Cells are decoded by
//! their runtime storage class, and integer cells of columns declared
//! `BOOLEAN` are normalized to `Value::Bool`.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection as RawSqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;

use super::core::{collect_rows, connect_error, decode_error, DatabaseConnection, ExecResult};
use crate::backends::DatabaseBackendType;
use crate::connection::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::result;
use crate::value::{Value, DATETIME_FORMAT};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite connection implementation
pub struct SqliteConnection {
    conn: RawSqliteConnection,
}

impl SqliteConnection {
    pub async fn connect(config: &ConnectionConfig) -> OrmResult<Self> {
        let options = if config.database == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| ModelError::Configuration(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database)
                .create_if_missing(true)
        };

        let conn = options
            .foreign_keys(true)
            .disable_statement_logging()
            .connect()
            .await
            .map_err(|e| connect_error(DatabaseBackendType::SQLite, e))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        let rowid = result.last_insert_rowid();
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: (rowid > 0).then_some(rowid),
        })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<result::Row>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        collect_rows(rows, sqlite_value_to_value)
    }

    async fn execute_unprepared(&mut self, sql: &str) -> OrmResult<()> {
        Executor::execute(&mut self.conn, sql)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;
        Ok(())
    }

    async fn ping(&mut self) -> OrmResult<()> {
        self.conn.ping().await.map_err(|e| ModelError::Connection(e.to_string()))
    }

    async fn close(self: Box<Self>) -> OrmResult<()> {
        let this = *self;
        this.conn.close().await.map_err(|e| ModelError::Connection(e.to_string()))
    }
}

fn bind_all<'q>(query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    params.iter().fold(query, bind_value)
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Json(j) => query.bind(j.to_string()),
        Value::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
    }
}

fn sqlite_value_to_value(row: &SqliteRow, index: usize) -> OrmResult<Value> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(index, "unknown", e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let declared = row.columns()[index].type_info().name().to_ascii_uppercase();
    let err = |e| decode_error(index, &storage, e);

    let value = match storage.as_str() {
        "INTEGER" => {
            let i = row.try_get_unchecked::<i64, _>(index).map_err(err)?;
            if declared == "BOOLEAN" || declared == "BOOL" {
                Value::Bool(i != 0)
            } else {
                Value::Int(i)
            }
        }
        "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index).map_err(err)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(err)?),
        _ => Value::String(row.try_get_unchecked::<String, _>(index).map_err(err)?),
    };
    Ok(value)
}
