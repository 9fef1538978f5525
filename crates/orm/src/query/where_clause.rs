//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use crate::value::Value;

impl QueryBuilder {
    fn push_where(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    /// `column = value`
    pub fn where_<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, "=", value)
    }

    /// `column <op> value`
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.push_basic(column, operator, value.into(), Boolean::And)
    }

    pub fn or_where<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.or_where_op(column, "=", value)
    }

    pub fn or_where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.push_basic(column, operator, value.into(), Boolean::Or)
    }

    fn push_basic(self, column: &str, operator: &str, value: Value, boolean: Boolean) -> Self {
        // `= NULL` never matches; compare against NULL the way callers mean it
        if value.is_null() {
            match operator.trim() {
                "=" => return self.push_null(column, false, boolean),
                "!=" | "<>" => return self.push_null(column, true, boolean),
                _ => {}
            }
        }
        self.push_where(WhereClause::Basic {
            column: column.to_string(),
            operator: operator.to_string(),
            value,
            boolean,
        })
    }

    /// Compare two columns: `first <op> second`
    pub fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_where(WhereClause::Column {
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
            boolean: Boolean::And,
        })
    }

    pub fn or_where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.push_where(WhereClause::Column {
            first: first.to_string(),
            operator: operator.to_string(),
            second: second.to_string(),
            boolean: Boolean::Or,
        })
    }

    fn push_in<I, T>(self, column: &str, values: I, negated: bool, boolean: Boolean) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.push_where(WhereClause::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated,
            boolean,
        })
    }

    /// `column IN (...)`; an empty list matches nothing
    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.push_in(column, values, false, Boolean::And)
    }

    /// `column NOT IN (...)`; an empty list matches everything
    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.push_in(column, values, true, Boolean::And)
    }

    pub fn or_where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.push_in(column, values, false, Boolean::Or)
    }

    pub fn or_where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.push_in(column, values, true, Boolean::Or)
    }

    pub fn where_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.push_where(WhereClause::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: false,
            boolean: Boolean::And,
        })
    }

    pub fn where_not_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.push_where(WhereClause::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: true,
            boolean: Boolean::And,
        })
    }

    fn push_null(self, column: &str, negated: bool, boolean: Boolean) -> Self {
        self.push_where(WhereClause::Null {
            column: column.to_string(),
            negated,
            boolean,
        })
    }

    pub fn where_null(self, column: &str) -> Self {
        self.push_null(column, false, Boolean::And)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.push_null(column, true, Boolean::And)
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.push_null(column, false, Boolean::Or)
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.push_null(column, true, Boolean::Or)
    }

    /// Parenthesized group of conditions built by `f`
    pub fn where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_nested(f, Boolean::And)
    }

    pub fn or_where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_nested(f, Boolean::Or)
    }

    fn push_nested<F>(self, f: F, boolean: Boolean) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let clauses = f(self.fresh()).wheres;
        if clauses.is_empty() {
            return self;
        }
        self.push_where(WhereClause::Nested { clauses, boolean })
    }

    /// Raw condition with `?` placeholders, bound in order. The SQL text is
    /// not sanitized; never build it from user input.
    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(WhereClause::Raw {
            sql: sql.to_string(),
            bindings,
            boolean: Boolean::And,
        })
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(WhereClause::Raw {
            sql: sql.to_string(),
            bindings,
            boolean: Boolean::Or,
        })
    }
}
