//! Relation queries and the eager "match" step
//!
//! A [`Relation`] is built from one parent model by a factory on
//! [`Model`] (`has_many`, `belongs_to`, ...). Lazy access constrains the
//! related query to that parent; eager loading re-keys the same query to
//! `IN (all parent keys)`, runs it once and hands every parent its subset.

use std::collections::HashMap;
use std::fmt;

use crate::collection::Collection;
use crate::error::{ModelError, OrmResult};
use crate::model::{Builder, Model, ModelContext, ModelSchema};
use crate::relationships::eager::Constraint;
use crate::relationships::Related;
use crate::value::Value;

/// Prefix under which pivot columns are selected for many-to-many results
pub(crate) const PIVOT_PREFIX: &str = "pivot_";

#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    HasOne {
        foreign_key: String,
        local_key: String,
    },
    HasMany {
        foreign_key: String,
        local_key: String,
    },
    BelongsTo {
        relation: String,
        foreign_key: String,
        owner_key: String,
    },
    BelongsToMany {
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
        parent_key: String,
        related_key: String,
        pivot_columns: Vec<String>,
    },
    MorphOne {
        type_column: String,
        id_column: String,
        morph_class: String,
        local_key: String,
    },
    MorphMany {
        type_column: String,
        id_column: String,
        morph_class: String,
        local_key: String,
    },
    MorphTo {
        name: String,
        type_column: String,
        id_column: String,
    },
}

impl RelationKind {
    /// Whether the relation yields at most one model
    pub fn is_single(&self) -> bool {
        matches!(
            self,
            RelationKind::HasOne { .. }
                | RelationKind::BelongsTo { .. }
                | RelationKind::MorphOne { .. }
                | RelationKind::MorphTo { .. }
        )
    }

    /// Parent attribute whose value keys the relation
    fn parent_column(&self) -> &str {
        match self {
            RelationKind::HasOne { local_key, .. }
            | RelationKind::HasMany { local_key, .. }
            | RelationKind::MorphOne { local_key, .. }
            | RelationKind::MorphMany { local_key, .. } => local_key,
            RelationKind::BelongsTo { foreign_key, .. } => foreign_key,
            RelationKind::BelongsToMany { parent_key, .. } => parent_key,
            RelationKind::MorphTo { id_column, .. } => id_column,
        }
    }
}

/// Pivot rows added and removed by [`Relation::sync`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncChanges {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
}

#[derive(Clone)]
pub struct Relation {
    kind: RelationKind,
    parent: ModelSchema,
    ctx: ModelContext,
    /// Value of the parent column named by `RelationKind::parent_column`
    parent_key: Value,
    /// `{name}_type` value of the parent, MorphTo only
    parent_type: Option<String>,
    /// Builder over the related entity; MorphTo resolves it per type
    related: Option<Builder>,
    constraints: Vec<Constraint>,
}

impl Relation {
    pub(crate) fn new(kind: RelationKind, parent: &Model, related: Option<Builder>) -> Self {
        let parent_key = parent.get_raw(kind.parent_column()).cloned().unwrap_or_default();
        let parent_type = match &kind {
            RelationKind::MorphTo { type_column, .. } => parent
                .get_raw(type_column)
                .and_then(Value::key_string)
                .filter(|t| !t.is_empty()),
            _ => None,
        };
        Self {
            kind,
            parent: *parent.schema(),
            ctx: parent.context().clone(),
            parent_key,
            parent_type,
            related,
            constraints: Vec::new(),
        }
    }

    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    pub fn parent_schema(&self) -> &ModelSchema {
        &self.parent
    }

    /// Related entity, unknown for MorphTo until a parent type is known
    pub fn related_schema(&self) -> Option<&ModelSchema> {
        self.related.as_ref().map(Builder::schema)
    }

    pub fn is_single(&self) -> bool {
        self.kind.is_single()
    }

    /// Narrow the related query, e.g. `relation.constrain(|q| q.where_("active", true))`
    pub fn constrain<F>(self, f: F) -> Self
    where
        F: Fn(Builder) -> Builder + Send + Sync + 'static,
    {
        self.with_constraint(Constraint::new(f))
    }

    pub(crate) fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn constrained(&self, builder: Builder) -> Builder {
        self.constraints.iter().fold(builder, |b, c| c.apply(b))
    }

    fn related_builder(&self) -> OrmResult<Builder> {
        let builder = self.related.clone().ok_or_else(|| {
            ModelError::RelationshipContract("Polymorphic target has not been resolved".to_string())
        })?;
        Ok(self.constrained(self.select_pivot(builder)))
    }

    /// Join the pivot table and select its key columns under `pivot_`
    fn select_pivot(&self, builder: Builder) -> Builder {
        let RelationKind::BelongsToMany {
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            related_key,
            pivot_columns,
            ..
        } = &self.kind
        else {
            return builder;
        };
        let related = builder.schema().table();
        let mut columns = vec![format!("{}.*", related)];
        for column in [foreign_pivot_key, related_pivot_key].into_iter().chain(pivot_columns) {
            columns.push(format!("{}.{} as {}{}", pivot_table, column, PIVOT_PREFIX, column));
        }
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        builder.select(&columns).join(
            pivot_table,
            &format!("{}.{}", pivot_table, related_pivot_key),
            "=",
            &format!("{}.{}", related, related_key),
        )
    }

    /// Resolve the MorphTo target entity from the morph map
    fn morph_target(&self, morph_type: &str) -> OrmResult<Builder> {
        let schema = self.ctx.morph_map().get(morph_type).ok_or_else(|| {
            ModelError::RelationshipContract(format!(
                "Morph type [{}] is not registered in the morph map",
                morph_type
            ))
        })?;
        Ok(self.constrained(Builder::new(schema, self.ctx.clone())?))
    }

    /// Related query constrained to the parent this relation was built from
    pub fn query(&self) -> OrmResult<Builder> {
        let key = self.parent_key.clone();
        let builder = match &self.kind {
            RelationKind::HasOne { foreign_key, .. } | RelationKind::HasMany { foreign_key, .. } => {
                let builder = self.related_builder()?;
                let column = builder.schema().qualify(foreign_key);
                builder.where_(&column, key)
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                let builder = self.related_builder()?;
                let column = builder.schema().qualify(owner_key);
                builder.where_(&column, key)
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                ..
            } => self
                .related_builder()?
                .where_(&format!("{}.{}", pivot_table, foreign_pivot_key), key),
            RelationKind::MorphOne {
                type_column,
                id_column,
                morph_class,
                ..
            }
            | RelationKind::MorphMany {
                type_column,
                id_column,
                morph_class,
                ..
            } => {
                let builder = self.related_builder()?;
                let type_column = builder.schema().qualify(type_column);
                let id_column = builder.schema().qualify(id_column);
                builder.where_(&type_column, morph_class.as_str()).where_(&id_column, key)
            }
            RelationKind::MorphTo { name, .. } => {
                let morph_type = self.parent_type.as_deref().ok_or_else(|| {
                    ModelError::RelationshipContract(format!("Relation [{}] has no morph type on the parent", name))
                })?;
                let builder = self.morph_target(morph_type)?;
                let column = builder.schema().qualified_key();
                builder.where_(&column, key)
            }
        };
        Ok(builder)
    }

    fn empty(&self) -> Related {
        if self.is_single() {
            Related::Empty
        } else {
            Related::Many(Collection::default())
        }
    }

    /// Load the related models for the parent. A parent without a key value
    /// (or a MorphTo without a type) yields an empty result without a query.
    pub async fn get_results(&self) -> OrmResult<Related> {
        if self.parent_key.is_null() {
            return Ok(self.empty());
        }
        if matches!(self.kind, RelationKind::MorphTo { .. }) && self.parent_type.is_none() {
            return Ok(self.empty());
        }

        let query = self.query()?;
        if self.is_single() {
            Ok(Related::from_option(query.first().await?))
        } else {
            let mut models = query.get().await?;
            if matches!(self.kind, RelationKind::BelongsToMany { .. }) {
                models.iter_mut().for_each(|m| m.take_pivot(PIVOT_PREFIX));
            }
            Ok(Related::Many(models))
        }
    }

    pub async fn get(&self) -> OrmResult<Collection<Model>> {
        Ok(self.get_results().await?.into_collection())
    }

    pub async fn first(&self) -> OrmResult<Option<Model>> {
        Ok(self.get_results().await?.into_collection().into_iter().next())
    }

    /// Load this relation for every parent with one query (one per morph
    /// type for MorphTo) and cache the matches under `name`
    pub(crate) async fn eager_load(&self, name: &str, parents: &mut [&mut Model]) -> OrmResult<()> {
        if let RelationKind::MorphTo { type_column, id_column, .. } = &self.kind {
            return self.eager_load_morph_to(name, type_column, id_column, parents).await;
        }

        let parent_column = self.kind.parent_column().to_string();
        let keys = unique_keys(parents.iter().map(|p| p.get_raw(&parent_column)));
        if keys.is_empty() {
            for parent in parents.iter_mut() {
                parent.set_relation(name, self.empty());
            }
            return Ok(());
        }

        let builder = self.related_builder()?;
        let related = builder.schema().table();
        let dictionary = match &self.kind {
            RelationKind::HasOne { foreign_key, .. } | RelationKind::HasMany { foreign_key, .. } => {
                let column = format!("{}.{}", related, foreign_key);
                let models = builder.where_in(&column, keys).get().await?;
                dictionary(models, |m| m.get_raw(foreign_key).and_then(Value::key_string))
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                let column = format!("{}.{}", related, owner_key);
                let models = builder.where_in(&column, keys).get().await?;
                dictionary(models, |m| m.get_raw(owner_key).and_then(Value::key_string))
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                ..
            } => {
                let column = format!("{}.{}", pivot_table, foreign_pivot_key);
                let mut models = builder.where_in(&column, keys).get().await?;
                models.iter_mut().for_each(|m| m.take_pivot(PIVOT_PREFIX));
                dictionary(models, |m| {
                    m.pivot()
                        .and_then(|p| p.get(foreign_pivot_key.as_str()))
                        .and_then(Value::key_string)
                })
            }
            RelationKind::MorphOne {
                type_column,
                id_column,
                morph_class,
                ..
            }
            | RelationKind::MorphMany {
                type_column,
                id_column,
                morph_class,
                ..
            } => {
                let models = builder
                    .where_(&format!("{}.{}", related, type_column), morph_class.as_str())
                    .where_in(&format!("{}.{}", related, id_column), keys)
                    .get()
                    .await?;
                dictionary(models, |m| m.get_raw(id_column).and_then(Value::key_string))
            }
            RelationKind::MorphTo { .. } => HashMap::new(),
        };

        self.assign(name, parents, &parent_column, &dictionary);
        Ok(())
    }

    async fn eager_load_morph_to(
        &self,
        name: &str,
        type_column: &str,
        id_column: &str,
        parents: &mut [&mut Model],
    ) -> OrmResult<()> {
        let mut by_type: Vec<(String, Vec<Option<&Value>>)> = Vec::new();
        for parent in parents.iter() {
            let Some(morph_type) = parent.get_raw(type_column).and_then(Value::key_string) else {
                continue;
            };
            let id = parent.get_raw(id_column);
            match by_type.iter_mut().find(|(t, _)| *t == morph_type) {
                Some((_, ids)) => ids.push(id),
                None => by_type.push((morph_type, vec![id])),
            }
        }

        let mut dictionaries: HashMap<String, HashMap<String, Vec<Model>>> = HashMap::new();
        for (morph_type, ids) in by_type {
            let keys = unique_keys(ids.into_iter());
            if keys.is_empty() {
                continue;
            }
            let builder = self.morph_target(&morph_type)?;
            let schema = *builder.schema();
            let models = builder.where_in(&schema.qualified_key(), keys).get().await?;
            let owner_key = schema.primary_key;
            dictionaries.insert(
                morph_type,
                dictionary(models, |m| m.get_raw(owner_key).and_then(Value::key_string)),
            );
        }

        for parent in parents.iter_mut() {
            let found = parent
                .get_raw(type_column)
                .and_then(Value::key_string)
                .and_then(|t| dictionaries.get(&t))
                .and_then(|d| parent.get_raw(id_column).and_then(Value::key_string).and_then(|k| d.get(&k)))
                .and_then(|models| models.first().cloned());
            parent.set_relation(name, Related::from_option(found));
        }
        Ok(())
    }

    fn assign(
        &self,
        name: &str,
        parents: &mut [&mut Model],
        parent_column: &str,
        dictionary: &HashMap<String, Vec<Model>>,
    ) {
        for parent in parents.iter_mut() {
            let matches = parent
                .get_raw(parent_column)
                .and_then(Value::key_string)
                .and_then(|key| dictionary.get(&key))
                .cloned()
                .unwrap_or_default();
            let related = if self.is_single() {
                Related::from_option(matches.into_iter().next())
            } else {
                Related::Many(Collection::new(matches))
            };
            parent.set_relation(name, related);
        }
    }

    fn pivot_parts(&self) -> OrmResult<(&str, &str, &str)> {
        match &self.kind {
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                ..
            } => Ok((pivot_table, foreign_pivot_key, related_pivot_key)),
            other => Err(ModelError::RelationshipContract(format!(
                "Pivot operations require a many-to-many relation, not {:?}",
                other
            ))),
        }
    }

    fn pivot_query(&self) -> OrmResult<crate::query::QueryBuilder> {
        let (pivot_table, _, _) = self.pivot_parts()?;
        let builder = self.related.as_ref().ok_or_else(|| {
            ModelError::RelationshipContract("Many-to-many relation has no related query".to_string())
        })?;
        Ok(crate::query::QueryBuilder::table(builder.query().connection().clone(), pivot_table))
    }

    fn require_parent_key(&self) -> OrmResult<Value> {
        if self.parent_key.is_null() {
            return Err(ModelError::MissingPrimaryKey);
        }
        Ok(self.parent_key.clone())
    }

    /// Insert pivot rows linking the parent to `ids`, with `extra` pivot
    /// columns on every row
    pub async fn attach<I, T>(&self, ids: I, extra: Vec<(String, Value)>) -> OrmResult<u64>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let (_, foreign_pivot_key, related_pivot_key) = self.pivot_parts()?;
        let parent = self.require_parent_key()?;
        let rows: Vec<Vec<(String, Value)>> = ids
            .into_iter()
            .map(|id| {
                let mut row = vec![
                    (foreign_pivot_key.to_string(), parent.clone()),
                    (related_pivot_key.to_string(), id.into()),
                ];
                row.extend(extra.iter().cloned());
                row
            })
            .collect();
        self.pivot_query()?.insert_many(rows).await
    }

    /// Remove pivot rows for `ids`, or every row of the parent with `None`
    pub async fn detach(&self, ids: Option<Vec<Value>>) -> OrmResult<u64> {
        let (_, foreign_pivot_key, related_pivot_key) = self.pivot_parts()?;
        let parent = self.require_parent_key()?;
        let query = self.pivot_query()?.where_(foreign_pivot_key, parent);
        match ids {
            Some(ids) if ids.is_empty() => Ok(0),
            Some(ids) => query.where_in(related_pivot_key, ids).delete().await,
            None => query.delete().await,
        }
    }

    /// Make `ids` the exact set of linked models
    pub async fn sync<I, T>(&self, ids: I) -> OrmResult<SyncChanges>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let (_, foreign_pivot_key, related_pivot_key) = self.pivot_parts()?;
        let parent = self.require_parent_key()?;
        let requested: Vec<Value> = ids.into_iter().map(Into::into).collect();
        let wanted = unique_keys(requested.iter().map(Some));
        let current = self
            .pivot_query()?
            .where_(foreign_pivot_key, parent)
            .pluck(related_pivot_key)
            .await?;

        let wanted_keys: Vec<Option<String>> = wanted.iter().map(Value::key_string).collect();
        let current_keys: Vec<Option<String>> = current.iter().map(Value::key_string).collect();

        let detached: Vec<Value> = current
            .iter()
            .filter(|v| !wanted_keys.contains(&v.key_string()))
            .cloned()
            .collect();
        let attached: Vec<Value> = wanted
            .iter()
            .filter(|v| !current_keys.contains(&v.key_string()))
            .cloned()
            .collect();

        if !detached.is_empty() {
            self.detach(Some(detached.clone())).await?;
        }
        if !attached.is_empty() {
            self.attach(attached.clone(), Vec::new()).await?;
        }
        Ok(SyncChanges { attached, detached })
    }
}

/// Distinct non-null values, first occurrence wins
fn unique_keys<'v>(values: impl Iterator<Item = Option<&'v Value>>) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    values
        .flatten()
        .filter(|v| v.key_string().map(|k| seen.insert(k)).unwrap_or(false))
        .cloned()
        .collect()
}

fn dictionary<F>(models: Collection<Model>, key: F) -> HashMap<String, Vec<Model>>
where
    F: Fn(&Model) -> Option<String>,
{
    let mut dictionary: HashMap<String, Vec<Model>> = HashMap::new();
    for model in models {
        if let Some(k) = key(&model) {
            dictionary.entry(k).or_default().push(model);
        }
    }
    dictionary
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("kind", &self.kind)
            .field("parent", &self.parent.class)
            .field("related", &self.related_schema().map(|s| s.class))
            .field("parent_key", &self.parent_key)
            .finish()
    }
}
