//! Query Builder - Core builder implementation

use std::fmt;
use std::sync::Arc;

use super::types::*;
use crate::backends::SqlDialect;
use crate::connection::ConnectionInterface;

/// Fluent SQL builder bound to one table and one connection.
///
/// Chain methods consume and return the builder. Nothing is validated or
/// sent until a terminal method (`get`, `count`, `insert`, `to_sql`, ...)
/// compiles the statement; identifiers and operators that fail validation
/// surface there as `ModelError::Validation`.
#[derive(Clone)]
pub struct QueryBuilder {
    pub(crate) conn: Arc<dyn ConnectionInterface>,
    pub(crate) table: String,
    pub(crate) columns: Vec<SelectColumn>,
    pub(crate) distinct: bool,
    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) groups: Vec<String>,
    pub(crate) havings: Vec<WhereClause>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl QueryBuilder {
    /// Start a query against `table` on `conn`
    pub fn table(conn: Arc<dyn ConnectionInterface>, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            columns: Vec::new(),
            distinct: false,
            wheres: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Empty builder on the same table and connection, for nested clauses
    pub(crate) fn fresh(&self) -> Self {
        Self::table(self.conn.clone(), self.table.clone())
    }

    pub fn connection(&self) -> &Arc<dyn ConnectionInterface> {
        &self.conn
    }

    pub fn dialect(&self) -> SqlDialect {
        self.conn.dialect()
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Replace the column list
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| SelectColumn::Name(c.to_string())).collect();
        self
    }

    pub fn add_select(mut self, columns: &[&str]) -> Self {
        self.columns
            .extend(columns.iter().map(|c| SelectColumn::Name(c.to_string())));
        self
    }

    /// Append an expression to the SELECT list verbatim. The expression is
    /// not sanitized; never build it from user input.
    pub fn select_raw(mut self, expression: &str) -> Self {
        self.columns.push(SelectColumn::Raw(expression.to_string()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Apply `f` only when `condition` holds
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("connection", &self.conn.name())
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("wheres", &self.wheres)
            .field("joins", &self.joins)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}
