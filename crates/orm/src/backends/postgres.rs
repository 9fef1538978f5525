//! PostgreSQL Backend Implementation
//!
//! Booleans, numerics and timestamps come back from the server in their
//! binary forms and are decoded by column type; nothing here relies on the
//! `t`/`f` text representation.

use async_trait::async_trait;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnectOptions, PgConnection, PgRow, PgTypeInfo, Postgres};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Executor, Row, TypeInfo, ValueRef};

use super::core::{collect_rows, connect_error, decode_error, DatabaseConnection, ExecResult};
use crate::backends::DatabaseBackendType;
use crate::connection::ConnectionConfig;
use crate::error::{ModelError, OrmResult};
use crate::result;
use crate::value::{Value, DATE_FORMAT};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// PostgreSQL connection implementation
pub struct PostgresConnection {
    conn: PgConnection,
}

impl PostgresConnection {
    pub async fn connect(config: &ConnectionConfig) -> OrmResult<Self> {
        let mut options = PgConnectOptions::new()
            .host(config.host.as_deref().unwrap_or("localhost"))
            .port(config.port.unwrap_or(5432))
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
            .map_err(|e| connect_error(DatabaseBackendType::PostgreSQL, e))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<result::Row>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| ModelError::from_sqlx(e, sql))?;

        collect_rows(rows, postgres_value_to_value)
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

/// NULL parameter sent with an unspecified type so the server infers it from
/// context (a text-typed NULL cannot be assigned to an integer column).
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn bind_all<'q>(query: PgQuery<'q>, params: &[Value]) -> PgQuery<'q> {
    params.iter().fold(query, bind_value)
}

fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Json(j) => query.bind(j.clone()),
        Value::DateTime(dt) => query.bind(*dt),
    }
}

fn postgres_value_to_value(row: &PgRow, index: usize) -> OrmResult<Value> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(index, "unknown", e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    let err = |e| decode_error(index, &type_name, e);

    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index).map_err(err)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index).map_err(err)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index).map_err(err)?),
        "INT8" => Value::Int(row.try_get::<i64, _>(index).map_err(err)?),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(index).map_err(err)?),
        "FLOAT8" => Value::Float(row.try_get::<f64, _>(index).map_err(err)?),
        "NUMERIC" => Value::String(row.try_get::<rust_decimal::Decimal, _>(index).map_err(err)?.to_string()),
        "BYTEA" => Value::Bytes(row.try_get::<Vec<u8>, _>(index).map_err(err)?),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index).map_err(err)?.to_string()),
        "TIMESTAMPTZ" => Value::DateTime(row.try_get::<chrono::DateTime<chrono::Utc>, _>(index).map_err(err)?),
        "TIMESTAMP" => Value::DateTime(row.try_get::<chrono::NaiveDateTime, _>(index).map_err(err)?.and_utc()),
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(index).map_err(err)?.format(DATE_FORMAT).to_string()),
        "TIME" => Value::String(row.try_get::<chrono::NaiveTime, _>(index).map_err(err)?.to_string()),
        "JSON" | "JSONB" => Value::Json(row.try_get::<serde_json::Value, _>(index).map_err(err)?),
        _ => Value::String(row.try_get::<String, _>(index).map_err(err)?),
    };
    Ok(value)
}
