//! Query Builder ORDER BY, GROUP BY, HAVING operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::value::Value;

impl QueryBuilder {
    /// Add ORDER BY clause; `direction` is `"asc"` or `"desc"`
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        self.orders.push(OrderClause {
            column: column.to_string(),
            direction: direction.to_string(),
        });
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, "desc")
    }

    /// Newest first by `column`
    pub fn latest(self, column: &str) -> Self {
        self.order_by(column, "desc")
    }

    /// Oldest first by `column`
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column, "asc")
    }

    /// Drop every ORDER BY added so far
    pub fn reorder(mut self) -> Self {
        self.orders.clear();
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.groups.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn having<T: Into<Value>>(mut self, column: &str, operator: &str, value: T) -> Self {
        self.havings.push(WhereClause::Basic {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_having<T: Into<Value>>(mut self, column: &str, operator: &str, value: T) -> Self {
        self.havings.push(WhereClause::Basic {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
            boolean: Boolean::Or,
        });
        self
    }

    /// Raw HAVING condition with `?` placeholders, e.g. `COUNT(*) > ?`
    pub fn having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.havings.push(WhereClause::Raw {
            sql: sql.to_string(),
            bindings,
            boolean: Boolean::And,
        });
        self
    }
}
