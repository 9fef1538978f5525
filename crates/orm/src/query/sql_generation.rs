//! Query Builder SQL generation
//!
//! Statements are compiled into a [`SqlWriter`] that appends a placeholder
//! and its binding in the same step, so bindings always come out in the
//! order their placeholders appear in the text.

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::SqlDialect;
use crate::error::{ModelError, OrmResult};
use crate::value::Value;

pub(crate) struct SqlWriter {
    dialect: SqlDialect,
    sql: String,
    bindings: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            bindings: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn param(&mut self, value: Value) {
        let placeholder = self.dialect.parameter_placeholder(self.bindings.len());
        self.sql.push_str(&placeholder);
        self.bindings.push(value);
    }

    fn wrap(&self, identifier: &str) -> OrmResult<String> {
        self.dialect.wrap(identifier)
    }

    fn push_wrapped(&mut self, identifier: &str) -> OrmResult<()> {
        let wrapped = self.wrap(identifier)?;
        self.push(&wrapped);
        Ok(())
    }

    /// Append raw SQL, turning each `?` into the dialect's next placeholder
    fn raw(&mut self, sql: &str, bindings: &[Value]) -> OrmResult<()> {
        let expected = sql.matches('?').count();
        if expected != bindings.len() {
            return Err(ModelError::Validation(format!(
                "Raw expression has {} placeholders but {} bindings: {}",
                expected,
                bindings.len(),
                sql
            )));
        }
        let mut values = bindings.iter();
        for (i, part) in sql.split('?').enumerate() {
            if i > 0 {
                if let Some(value) = values.next() {
                    self.param(value.clone());
                }
            }
            self.push(part);
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }
}

fn operator(op: &str) -> OrmResult<QueryOperator> {
    op.parse()
}

impl QueryBuilder {
    /// Compiled SELECT statement
    pub fn to_sql(&self) -> OrmResult<String> {
        Ok(self.to_sql_with_bindings()?.0)
    }

    /// Compiled SELECT statement and its bindings in placeholder order
    pub fn to_sql_with_bindings(&self) -> OrmResult<(String, Vec<Value>)> {
        let mut w = SqlWriter::new(self.dialect());
        self.compile_select(&mut w)?;
        Ok(w.finish())
    }

    pub(crate) fn compile_select(&self, w: &mut SqlWriter) -> OrmResult<()> {
        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if self.columns.is_empty() {
            w.push("*");
        } else {
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                match column {
                    SelectColumn::Name(name) => w.push_wrapped(name)?,
                    SelectColumn::Raw(expression) => w.push(expression),
                }
            }
        }

        w.push(" FROM ");
        w.push_wrapped(&self.table)?;
        self.compile_joins(w)?;
        self.compile_wheres(w)?;

        if !self.groups.is_empty() {
            w.push(" GROUP BY ");
            let groups = self
                .groups
                .iter()
                .map(|g| w.wrap(g))
                .collect::<OrmResult<Vec<_>>>()?;
            w.push(&groups.join(", "));
        }
        if !self.havings.is_empty() {
            w.push(" HAVING ");
            compile_conditions(w, &self.havings)?;
        }

        if !self.orders.is_empty() {
            w.push(" ORDER BY ");
            for (i, order) in self.orders.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                let direction: OrderDirection = order.direction.parse()?;
                w.push_wrapped(&order.column)?;
                w.push(&format!(" {}", direction));
            }
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => w.push(&format!(" LIMIT {}", limit)),
            (None, Some(_)) => {
                if let Some(unbounded) = w.dialect.unbounded_limit() {
                    w.push(" ");
                    w.push(unbounded);
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            w.push(&format!(" OFFSET {}", offset));
        }
        Ok(())
    }

    fn compile_joins(&self, w: &mut SqlWriter) -> OrmResult<()> {
        for join in &self.joins {
            let op = operator(&join.operator)?;
            w.push(&format!(" {} ", join.join_type));
            w.push_wrapped(&join.table)?;
            w.push(" ON ");
            w.push_wrapped(&join.first)?;
            w.push(&format!(" {} ", op));
            w.push_wrapped(&join.second)?;
        }
        Ok(())
    }

    fn compile_wheres(&self, w: &mut SqlWriter) -> OrmResult<()> {
        if !self.wheres.is_empty() {
            w.push(" WHERE ");
            compile_conditions(w, &self.wheres)?;
        }
        Ok(())
    }

    fn reject_joins(&self, statement: &str) -> OrmResult<()> {
        if self.joins.is_empty() {
            Ok(())
        } else {
            Err(ModelError::Validation(format!("Joins are not supported in {} statements", statement)))
        }
    }

    /// `INSERT` of one or more rows. Columns come from the first row; later
    /// rows missing a column insert NULL for it.
    pub(crate) fn compile_insert(&self, rows: &[Vec<(String, Value)>], returning: Option<&str>) -> OrmResult<(String, Vec<Value>)> {
        let mut w = SqlWriter::new(self.dialect());
        let table = w.wrap(&self.table)?;
        let columns: Vec<&str> = rows
            .first()
            .map(|row| row.iter().map(|(c, _)| c.as_str()).collect())
            .unwrap_or_default();

        if columns.is_empty() {
            let sql = w.dialect.insert_default_values(&table);
            w.push(&sql);
        } else {
            let wrapped = columns.iter().map(|c| w.wrap(c)).collect::<OrmResult<Vec<_>>>()?;
            w.push(&format!("INSERT INTO {} ({}) VALUES ", table, wrapped.join(", ")));
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    w.push(", ");
                }
                w.push("(");
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    let value = row
                        .iter()
                        .find(|(c, _)| c == column)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default();
                    w.param(value);
                }
                w.push(")");
            }
        }

        if let Some(key) = returning {
            if w.dialect.supports_returning() {
                w.push(" RETURNING ");
                w.push_wrapped(key)?;
            }
        }
        Ok(w.finish())
    }

    pub(crate) fn compile_update(&self, assignments: &[(String, Assignment)]) -> OrmResult<(String, Vec<Value>)> {
        self.reject_joins("UPDATE")?;
        if assignments.is_empty() {
            return Err(ModelError::Validation("UPDATE requires at least one column".to_string()));
        }
        let mut w = SqlWriter::new(self.dialect());
        w.push("UPDATE ");
        w.push_wrapped(&self.table)?;
        w.push(" SET ");
        for (i, (column, assignment)) in assignments.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            let wrapped = w.wrap(column)?;
            match assignment {
                Assignment::Set(value) => {
                    w.push(&format!("{} = ", wrapped));
                    w.param(value.clone());
                }
                Assignment::Add(amount) => {
                    w.push(&format!("{} = {} + ", wrapped, wrapped));
                    w.param(amount.clone());
                }
            }
        }
        self.compile_wheres(&mut w)?;
        Ok(w.finish())
    }

    pub(crate) fn compile_delete(&self) -> OrmResult<(String, Vec<Value>)> {
        self.reject_joins("DELETE")?;
        let mut w = SqlWriter::new(self.dialect());
        w.push("DELETE FROM ");
        w.push_wrapped(&self.table)?;
        self.compile_wheres(&mut w)?;
        Ok(w.finish())
    }

    /// `SELECT FN(column) AS aggregate ...` ignoring order, limit and offset.
    /// Grouped queries are wrapped so the aggregate runs over the groups:
    /// COUNT counts them, other functions aggregate the per-group results.
    pub(crate) fn compile_aggregate(&self, function: &str, column: &str) -> OrmResult<(String, Vec<Value>)> {
        let mut inner = self.clone();
        inner.orders.clear();
        inner.limit = None;
        inner.offset = None;

        let mut w = SqlWriter::new(self.dialect());
        if !inner.groups.is_empty() {
            if inner.columns.is_empty() {
                inner.columns = inner.groups.iter().cloned().map(SelectColumn::Name).collect();
            }
            let outer = if function.eq_ignore_ascii_case("COUNT") {
                "*".to_string()
            } else {
                let target = if column == "*" { "*".to_string() } else { w.wrap(column)? };
                let alias = w.wrap("aggregate_value")?;
                inner
                    .columns
                    .push(SelectColumn::Raw(format!("{}({}) AS {}", function, target, alias)));
                alias
            };
            w.push(&format!("SELECT {}({}) AS aggregate FROM (", function, outer));
            inner.compile_select(&mut w)?;
            w.push(") AS ");
            w.push_wrapped("aggregate_table")?;
            return Ok(w.finish());
        }

        let target = if column == "*" { "*".to_string() } else { w.wrap(column)? };
        let expression = if inner.distinct && column != "*" {
            format!("{}(DISTINCT {}) AS aggregate", function, target)
        } else {
            format!("{}({}) AS aggregate", function, target)
        };
        inner.distinct = false;
        inner.columns = vec![SelectColumn::Raw(expression)];
        inner.compile_select(&mut w)?;
        Ok(w.finish())
    }
}

fn compile_conditions(w: &mut SqlWriter, clauses: &[WhereClause]) -> OrmResult<()> {
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            w.push(&format!(" {} ", clause.boolean()));
        }
        compile_condition(w, clause)?;
    }
    Ok(())
}

fn compile_condition(w: &mut SqlWriter, clause: &WhereClause) -> OrmResult<()> {
    match clause {
        WhereClause::Basic { column, operator: op, value, .. } => {
            let op = operator(op)?;
            w.push_wrapped(column)?;
            w.push(&format!(" {} ", op));
            w.param(value.clone());
        }
        WhereClause::Column { first, operator: op, second, .. } => {
            let op = operator(op)?;
            w.push_wrapped(first)?;
            w.push(&format!(" {} ", op));
            w.push_wrapped(second)?;
        }
        WhereClause::In { column, values, negated, .. } => {
            if values.is_empty() {
                // sanitize anyway so a bad name is never silently ignored
                w.wrap(column)?;
                w.push(if *negated { "1 = 1" } else { "0 = 1" });
            } else {
                w.push_wrapped(column)?;
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.param(value.clone());
                }
                w.push(")");
            }
        }
        WhereClause::Between { column, low, high, negated, .. } => {
            w.push_wrapped(column)?;
            w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
            w.param(low.clone());
            w.push(" AND ");
            w.param(high.clone());
        }
        WhereClause::Null { column, negated, .. } => {
            w.push_wrapped(column)?;
            w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        WhereClause::Nested { clauses, .. } => {
            w.push("(");
            compile_conditions(w, clauses)?;
            w.push(")");
        }
        WhereClause::Raw { sql, bindings, .. } => w.raw(sql, bindings)?,
    }
    Ok(())
}
