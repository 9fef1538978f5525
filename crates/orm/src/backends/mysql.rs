//! MySQL / MariaDB Backend Implementation
//!
//! `TINYINT(1)` columns are reported by the server as `BOOLEAN` and decoded
//! to `Value::Bool`.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection as RawMySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Executor, Row, TypeInfo, ValueRef};

use super::core::{collect_rows, connect_error, decode_error, DatabaseConnection, ExecResult};
use crate::backends::DatabaseBackendType;
use crate::connection::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::result;
use crate::value::{Value, DATE_FORMAT};

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// MySQL connection implementation
pub struct MySqlConnection {
    conn: RawMySqlConnection,
}

impl MySqlConnection {
    pub async fn connect(config: &ConnectionConfig) -> OrmResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(config.host.as_deref().unwrap_or("localhost"))
            .port(config.port.unwrap_or(3306))
            .database(&config.database);
        if let Some(username) = &config.username {
            options = options.username(username);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        let conn = options
            .disable_statement_logging()
            .connect()
            .await
            .map_err(|e| connect_error(DatabaseBackendType::MySQL, e))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseConnection for MySqlConnection {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::MySQL
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        let id = result.last_insert_id();
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: (id > 0).then(|| i64::try_from(id).unwrap_or(i64::MAX)),
        })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<result::Row>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        collect_rows(rows, mysql_value_to_value)
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

fn bind_all<'q>(query: MySqlQuery<'q>, params: &[Value]) -> MySqlQuery<'q> {
    params.iter().fold(query, bind_value)
}

fn bind_value<'q>(query: MySqlQuery<'q>, value: &Value) -> MySqlQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Json(j) => query.bind(j.to_string()),
        Value::DateTime(dt) => query.bind(dt.naive_utc()),
    }
}

fn mysql_value_to_value(row: &MySqlRow, index: usize) -> OrmResult<Value> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(index, "unknown", e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let err = |e| decode_error(index, &type_name, e);

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(index).map_err(err)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked::<i64, _>(index).map_err(err)?)
        }
        name if name.ends_with("UNSIGNED") => Value::from(row.try_get_unchecked::<u64, _>(index).map_err(err)?),
        "FLOAT" => Value::from(row.try_get_unchecked::<f32, _>(index).map_err(err)?),
        "DOUBLE" => Value::Float(row.try_get_unchecked::<f64, _>(index).map_err(err)?),
        "DECIMAL" => Value::String(row.try_get_unchecked::<rust_decimal::Decimal, _>(index).map_err(err)?.to_string()),
        "DATETIME" | "TIMESTAMP" => {
            Value::DateTime(row.try_get_unchecked::<chrono::NaiveDateTime, _>(index).map_err(err)?.and_utc())
        }
        "DATE" => Value::String(
            row.try_get_unchecked::<chrono::NaiveDate, _>(index)
                .map_err(err)?
                .format(DATE_FORMAT)
                .to_string(),
        ),
        "TIME" => Value::String(row.try_get_unchecked::<chrono::NaiveTime, _>(index).map_err(err)?.to_string()),
        "JSON" => Value::Json(row.try_get_unchecked::<serde_json::Value, _>(index).map_err(err)?),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY" => {
            Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(err)?)
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index).map_err(err)?),
    };
    Ok(value)
}
