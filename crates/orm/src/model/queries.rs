//! Entry points on the entity type itself: `Product::find(&ctx, 1)`

use async_trait::async_trait;

use crate::collection::Collection;
use crate::error::{ModelError, OrmResult};
use crate::model::{Builder, Model, ModelContext, ModelDefinition, ModelSchema};
use crate::value::Value;

type Attributes = Vec<(String, Value)>;

/// Static query helpers, implemented for every [`ModelDefinition`]
#[async_trait]
pub trait ModelQueries: ModelDefinition + Sized {
    /// Start a model query
    fn query(ctx: &ModelContext) -> OrmResult<Builder> {
        Builder::new(ModelSchema::of::<Self>(), ctx.clone())
    }

    /// Query with relations to eager load
    fn with(ctx: &ModelContext, relations: &[&str]) -> OrmResult<Builder> {
        Ok(Self::query(ctx)?.with(relations))
    }

    /// Unsaved model filled through the mass-assignment guard
    fn make<I, K, V>(ctx: &ModelContext, attributes: I) -> Model
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut model = Model::of::<Self>(ctx);
        model.fill(attributes);
        model
    }

    async fn all(ctx: &ModelContext) -> OrmResult<Collection<Model>> {
        Self::query(ctx)?.get().await
    }

    async fn find<T: Into<Value> + Send>(ctx: &ModelContext, id: T) -> OrmResult<Option<Model>> {
        Self::query(ctx)?.find(id).await
    }

    async fn find_many(ctx: &ModelContext, ids: Vec<Value>) -> OrmResult<Collection<Model>> {
        Self::query(ctx)?.find_many(ids).await
    }

    async fn find_or_fail<T: Into<Value> + Send>(ctx: &ModelContext, id: T) -> OrmResult<Model> {
        Self::query(ctx)?.find_or_fail(id).await
    }

    async fn first_or_fail(ctx: &ModelContext) -> OrmResult<Model> {
        Self::query(ctx)?.first_or_fail().await
    }

    /// Fill, save and return a new model
    async fn create(ctx: &ModelContext, attributes: Attributes) -> OrmResult<Model> {
        let mut model = Self::make(ctx, attributes);
        if !model.save().await? {
            return Err(ModelError::Event(format!("Creating {} was cancelled by an observer", Self::CLASS)));
        }
        Ok(model)
    }

    /// First model matching `search`, or a new one created from `search`
    /// plus `values`
    async fn first_or_create(ctx: &ModelContext, search: Attributes, values: Attributes) -> OrmResult<Model> {
        let query = search
            .iter()
            .fold(Self::query(ctx)?, |q, (column, value)| q.where_(column, value.clone()));
        if let Some(model) = query.first().await? {
            return Ok(model);
        }
        Self::create(ctx, search.into_iter().chain(values).collect()).await
    }

    /// Update the first model matching `search` with `values`, or create it
    async fn update_or_create(ctx: &ModelContext, search: Attributes, values: Attributes) -> OrmResult<Model> {
        let query = search
            .iter()
            .fold(Self::query(ctx)?, |q, (column, value)| q.where_(column, value.clone()));
        match query.first().await? {
            Some(mut model) => {
                model.fill(values);
                model.save().await?;
                Ok(model)
            }
            None => Self::create(ctx, search.into_iter().chain(values).collect()).await,
        }
    }

    /// Load and delete each model with one of `ids`, so observers run.
    /// Returns how many were deleted.
    async fn destroy(ctx: &ModelContext, ids: Vec<Value>) -> OrmResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for mut model in Self::query(ctx)?.find_many(ids).await? {
            if model.delete().await? == Some(true) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl<D: ModelDefinition> ModelQueries for D {}

/// Owned attribute pairs for [`ModelQueries::create`] and friends
pub fn attributes<I, K, V>(pairs: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
