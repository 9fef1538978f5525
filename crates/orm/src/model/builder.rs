//! Model Builder - a query builder that hydrates models
//!
//! Wraps a [`QueryBuilder`] with the entity's schema: results come back as
//! [`Model`]s, the soft-delete scope is applied, and requested relations are
//! eager loaded after the main query.

use chrono::Utc;
use std::fmt;
use std::future::Future;

use crate::collection::Collection;
use crate::error::{ModelError, OrmResult};
use crate::model::context::ModelContext;
use crate::model::definition::ModelSchema;
use crate::model::Model;
use crate::pagination::Paginator;
use crate::query::QueryBuilder;
use crate::relationships::eager::{self, Constraint, EagerLoad};
use crate::value::Value;

/// Which rows the soft-delete scope lets through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashedScope {
    Exclude,
    Include,
    Only,
}

#[derive(Clone)]
pub struct Builder {
    query: QueryBuilder,
    schema: ModelSchema,
    ctx: ModelContext,
    eager: Vec<EagerLoad>,
    trashed: TrashedScope,
}

impl Builder {
    pub fn new(schema: ModelSchema, ctx: ModelContext) -> OrmResult<Self> {
        let conn = ctx.connection_for(&schema)?;
        Ok(Self {
            query: QueryBuilder::table(conn, schema.table()),
            schema,
            ctx,
            eager: Vec::new(),
            trashed: TrashedScope::Exclude,
        })
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn context(&self) -> &ModelContext {
        &self.ctx
    }

    /// The underlying query without the soft-delete scope
    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    /// Modify the underlying query directly
    pub fn tap<F>(mut self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.query = f(self.query);
        self
    }

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

    pub fn select(self, columns: &[&str]) -> Self {
        self.tap(|q| q.select(columns))
    }

    pub fn add_select(self, columns: &[&str]) -> Self {
        self.tap(|q| q.add_select(columns))
    }

    pub fn where_<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.tap(|q| q.where_(column, value))
    }

    pub fn where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.tap(|q| q.where_op(column, operator, value))
    }

    pub fn or_where<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.tap(|q| q.or_where(column, value))
    }

    pub fn or_where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.tap(|q| q.or_where_op(column, operator, value))
    }

    pub fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        self.tap(|q| q.where_column(first, operator, second))
    }

    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.tap(|q| q.where_in(column, values))
    }

    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.tap(|q| q.where_not_in(column, values))
    }

    pub fn where_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.tap(|q| q.where_between(column, low, high))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.tap(|q| q.where_null(column))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.tap(|q| q.where_not_null(column))
    }

    pub fn where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.tap(|q| q.where_nested(f))
    }

    pub fn or_where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.tap(|q| q.or_where_nested(f))
    }

    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.tap(|q| q.where_raw(sql, bindings))
    }

    pub fn join(self, table: &str, first: &str, operator: &str, second: &str) -> Self {
        self.tap(|q| q.join(table, first, operator, second))
    }

    pub fn order_by(self, column: &str, direction: &str) -> Self {
        self.tap(|q| q.order_by(column, direction))
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.tap(|q| q.order_by_desc(column))
    }

    pub fn latest(self, column: &str) -> Self {
        self.tap(|q| q.latest(column))
    }

    pub fn oldest(self, column: &str) -> Self {
        self.tap(|q| q.oldest(column))
    }

    pub fn limit(self, count: u64) -> Self {
        self.tap(|q| q.limit(count))
    }

    pub fn offset(self, count: u64) -> Self {
        self.tap(|q| q.offset(count))
    }

    pub fn take(self, count: u64) -> Self {
        self.limit(count)
    }

    pub fn skip(self, count: u64) -> Self {
        self.offset(count)
    }

    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        self.tap(|q| q.for_page(page, per_page))
    }

    /// Include soft-deleted rows
    pub fn with_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Include;
        self
    }

    /// Only soft-deleted rows
    pub fn only_trashed(mut self) -> Self {
        self.trashed = TrashedScope::Only;
        self
    }

    /// Eager load relations by name; `a.b` loads `b` on every loaded `a`
    pub fn with(mut self, relations: &[&str]) -> Self {
        EagerLoad::merge(&mut self.eager, &EagerLoad::parse(relations));
        self
    }

    /// Eager load one relation with an extra constraint on its query
    pub fn with_constraint<F>(mut self, relation: &str, f: F) -> Self
    where
        F: Fn(Builder) -> Builder + Send + Sync + 'static,
    {
        EagerLoad::constrain(&mut self.eager, relation, Constraint::new(f));
        self
    }

    pub(crate) fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager
    }

    /// The query as it will run, with the soft-delete scope applied
    pub fn to_base(&self) -> QueryBuilder {
        let Some(column) = self.schema.soft_delete_column else {
            return self.query.clone();
        };
        let column = self.schema.qualify(column);
        match self.trashed {
            TrashedScope::Exclude => self.query.clone().where_null(&column),
            TrashedScope::Include => self.query.clone(),
            TrashedScope::Only => self.query.clone().where_not_null(&column),
        }
    }

    pub fn to_sql(&self) -> OrmResult<String> {
        self.to_base().to_sql()
    }

    /// All matching models, with requested relations loaded
    pub async fn get(&self) -> OrmResult<Collection<Model>> {
        let rows = self.to_base().get().await?;
        let mut models: Vec<Model> = rows
            .into_iter()
            .map(|row| Model::from_row(self.schema, self.ctx.clone(), row))
            .collect();
        if !models.is_empty() && !self.eager.is_empty() {
            let mut refs: Vec<&mut Model> = models.iter_mut().collect();
            eager::load_relations(&mut refs, &self.eager).await?;
        }
        Ok(Collection::new(models))
    }

    pub async fn first(&self) -> OrmResult<Option<Model>> {
        Ok(self.clone().limit(1).get().await?.into_iter().next())
    }

    pub async fn first_or_fail(&self) -> OrmResult<Model> {
        self.first()
            .await?
            .ok_or_else(|| ModelError::not_found(self.schema.class, Vec::new()))
    }

    pub async fn find(&self, id: impl Into<Value>) -> OrmResult<Option<Model>> {
        let key = self.schema.qualified_key();
        self.clone().where_(&key, id).first().await
    }

    pub async fn find_or_fail(&self, id: impl Into<Value>) -> OrmResult<Model> {
        let id = id.into();
        let label = id.to_string();
        self.find(id)
            .await?
            .ok_or_else(|| ModelError::not_found(self.schema.class, vec![label]))
    }

    pub async fn find_many<I, T>(&self, ids: I) -> OrmResult<Collection<Model>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let key = self.schema.qualified_key();
        self.clone().where_in(&key, ids).get().await
    }

    /// Models of one page plus the total from a separate COUNT
    pub async fn paginate(&self, per_page: u64, page: u64) -> OrmResult<Paginator<Model>> {
        let per_page = per_page.max(1);
        let total = self.count().await?;
        let items = self.clone().for_page(page, per_page).get().await?;
        Ok(Paginator::new(items.into_vec(), total as u64, per_page, page))
    }

    pub async fn count(&self) -> OrmResult<i64> {
        self.to_base().reorder().count("*").await
    }

    pub async fn exists(&self) -> OrmResult<bool> {
        self.to_base().exists().await
    }

    pub async fn pluck(&self, column: &str) -> OrmResult<Vec<Value>> {
        self.to_base().pluck(column).await
    }

    /// Walk the results `size` models at a time, ordered by primary key
    /// unless an order is set. Stops early when `f` returns `false`.
    pub async fn chunk<F, Fut>(&self, size: u64, mut f: F) -> OrmResult<()>
    where
        F: FnMut(Collection<Model>) -> Fut,
        Fut: Future<Output = OrmResult<bool>>,
    {
        let size = size.max(1);
        let ordered = if self.query.orders.is_empty() {
            let key = self.schema.qualified_key();
            self.clone().order_by(&key, "asc")
        } else {
            self.clone()
        };

        let mut page: u64 = 1;
        loop {
            let batch = ordered.clone().for_page(page, size).get().await?;
            let fetched = batch.len() as u64;
            if fetched == 0 || !f(batch).await? || fetched < size {
                return Ok(());
            }
            page = page.saturating_add(1);
        }
    }

    /// Update matching rows; `updated_at` is set when the entity keeps
    /// timestamps
    pub async fn update<I, K, V>(&self, values: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut values: Vec<(String, Value)> = values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if self.schema.timestamps && !values.iter().any(|(k, _)| k == "updated_at") {
            values.push(("updated_at".to_string(), Value::DateTime(now())));
        }
        self.to_base().update(values).await
    }

    /// Delete matching rows; soft-deletable entities get their deleted-at
    /// column set instead
    pub async fn delete(&self) -> OrmResult<u64> {
        match self.schema.soft_delete_column {
            Some(column) => self.update([(column, Value::DateTime(now()))]).await,
            None => self.to_base().delete().await,
        }
    }

    pub async fn force_delete(&self) -> OrmResult<u64> {
        self.clone().with_trashed().to_base().delete().await
    }

    /// Clear the deleted-at column on matching trashed rows
    pub async fn restore(&self) -> OrmResult<u64> {
        let Some(column) = self.schema.soft_delete_column else {
            return Err(ModelError::Validation(format!(
                "{} does not use soft deletes",
                self.schema.class
            )));
        };
        self.clone().only_trashed().update([(column, Value::Null)]).await
    }
}

/// Current time at the second precision stored in the database
pub(crate) fn now() -> chrono::DateTime<Utc> {
    use chrono::SubsecRound;
    Utc::now().trunc_subsecs(0)
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("model", &self.schema.class)
            .field("query", &self.query)
            .field("eager", &self.eager.iter().map(|e| e.name.as_str()).collect::<Vec<_>>())
            .field("trashed", &self.trashed)
            .finish()
    }
}
