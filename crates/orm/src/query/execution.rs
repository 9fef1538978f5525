//! Query Builder execution of SELECT statements

use super::builder::QueryBuilder;
use super::types::SelectColumn;
use crate::error::OrmResult;
use crate::result::{ResultSet, Row};
use crate::value::Value;

impl QueryBuilder {
    /// Execute the query and return every row
    pub async fn get(&self) -> OrmResult<ResultSet> {
        let (sql, bindings) = self.to_sql_with_bindings()?;
        self.conn.query(&sql, &bindings).await
    }

    /// First matching row
    pub async fn first(&self) -> OrmResult<Option<Row>> {
        let rows = self.clone().limit(1).get().await?;
        Ok(rows.into_rows().into_iter().next())
    }

    /// First row whose `column` equals `id`
    pub async fn find<T: Into<Value>>(&self, column: &str, id: T) -> OrmResult<Option<Row>> {
        self.clone().where_(column, id).first().await
    }

    /// Value of one column from the first matching row
    pub async fn value(&self, column: &str) -> OrmResult<Value> {
        let row = self.clone().select(&[column]).first().await?;
        Ok(row
            .and_then(|r| r.get_index(0).cloned())
            .unwrap_or_default())
    }

    /// Number of matching rows (`column` is usually `"*"`). Ordering, limit
    /// and offset are ignored; grouped queries count groups.
    pub async fn count(&self, column: &str) -> OrmResult<i64> {
        Ok(self.aggregate("COUNT", column).await?.as_i64().unwrap_or(0))
    }

    pub async fn exists(&self) -> OrmResult<bool> {
        let mut first_row = self.clone().limit(1);
        first_row.columns = vec![SelectColumn::Raw("1".to_string())];
        first_row.orders.clear();
        Ok(!first_row.get().await?.is_empty())
    }

    pub async fn doesnt_exist(&self) -> OrmResult<bool> {
        Ok(!self.exists().await?)
    }

    /// Values of a single column, in row order
    pub async fn pluck(&self, column: &str) -> OrmResult<Vec<Value>> {
        let rows = self.clone().select(&[column]).get().await?;
        Ok(rows
            .into_rows()
            .into_iter()
            .map(|row| row.get_index(0).cloned().unwrap_or_default())
            .collect())
    }

    /// `SUM(column)`; `Null` when no rows match
    pub async fn sum(&self, column: &str) -> OrmResult<Value> {
        self.aggregate("SUM", column).await
    }

    pub async fn avg(&self, column: &str) -> OrmResult<Option<f64>> {
        Ok(self.aggregate("AVG", column).await?.as_f64())
    }

    pub async fn min(&self, column: &str) -> OrmResult<Value> {
        self.aggregate("MIN", column).await
    }

    pub async fn max(&self, column: &str) -> OrmResult<Value> {
        self.aggregate("MAX", column).await
    }

    async fn aggregate(&self, function: &str, column: &str) -> OrmResult<Value> {
        let (sql, bindings) = self.compile_aggregate(function, column)?;
        let row = self.conn.select_one(&sql, &bindings).await?;
        Ok(row
            .and_then(|r| r.get("aggregate").cloned())
            .unwrap_or_default())
    }
}
