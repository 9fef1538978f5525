//! Query Builder DML operations (INSERT, UPDATE, DELETE)

use super::builder::QueryBuilder;
use super::types::Assignment;
use crate::error::OrmResult;
use crate::value::Value;

fn collect_row<I, K, V>(values: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl QueryBuilder {
    /// Insert one row. An empty row inserts the table defaults.
    pub async fn insert<I, K, V>(&self, values: I) -> OrmResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (sql, bindings) = self.compile_insert(&[collect_row(values)], None)?;
        self.conn.execute(&sql, &bindings).await?;
        Ok(true)
    }

    /// Insert several rows in one statement
    pub async fn insert_many(&self, rows: Vec<Vec<(String, Value)>>) -> OrmResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (sql, bindings) = self.compile_insert(&rows, None)?;
        self.conn.execute(&sql, &bindings).await
    }

    /// Insert one row and return the generated `key`
    pub async fn insert_get_id<I, K, V>(&self, values: I, key: &str) -> OrmResult<Option<i64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (sql, bindings) = self.compile_insert(&[collect_row(values)], Some(key))?;
        self.conn.insert_get_id(&sql, &bindings).await
    }

    /// Update matching rows and return how many changed
    pub async fn update<I, K, V>(&self, values: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let assignments: Vec<(String, Assignment)> = collect_row(values)
            .into_iter()
            .map(|(column, value)| (column, Assignment::Set(value)))
            .collect();
        let (sql, bindings) = self.compile_update(&assignments)?;
        self.conn.execute(&sql, &bindings).await
    }

    /// Add `amount` to `column` on matching rows, setting `extra` columns too
    pub async fn increment_each<T: Into<Value>>(
        &self,
        column: &str,
        amount: T,
        extra: Vec<(String, Value)>,
    ) -> OrmResult<u64> {
        let mut assignments = vec![(column.to_string(), Assignment::Add(amount.into()))];
        assignments.extend(extra.into_iter().map(|(c, v)| (c, Assignment::Set(v))));
        let (sql, bindings) = self.compile_update(&assignments)?;
        self.conn.execute(&sql, &bindings).await
    }

    pub async fn increment(&self, column: &str, amount: i64) -> OrmResult<u64> {
        self.increment_each(column, amount, Vec::new()).await
    }

    pub async fn decrement(&self, column: &str, amount: i64) -> OrmResult<u64> {
        self.increment_each(column, -amount, Vec::new()).await
    }

    /// Delete matching rows and return how many were removed
    pub async fn delete(&self) -> OrmResult<u64> {
        let (sql, bindings) = self.compile_delete()?;
        self.conn.execute(&sql, &bindings).await
    }
}
