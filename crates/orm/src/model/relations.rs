//! Relationship factories
//!
//! Called from a [`ModelDefinition::relation`] hook to describe a relation
//! of the parent model. Key arguments left as `None` follow the naming
//! conventions in [`inference`].
//!
//! [`ModelDefinition::relation`]: crate::model::ModelDefinition::relation

use crate::error::{ModelError, OrmResult};
use crate::model::{Builder, Model, ModelDefinition, ModelSchema};
use crate::relationships::eager::{self, EagerLoad};
use crate::relationships::{inference, Related, Relation, RelationKind};

impl Model {
    fn related_builder<R: ModelDefinition>(&self) -> OrmResult<Builder> {
        Builder::new(ModelSchema::of::<R>(), self.ctx.clone())
    }

    /// One `R` whose `foreign_key` (default `{parent}_id`) holds this
    /// model's `local_key` (default primary key)
    pub fn has_one<R: ModelDefinition>(&self, foreign_key: Option<&str>, local_key: Option<&str>) -> OrmResult<Relation> {
        let kind = RelationKind::HasOne {
            foreign_key: foreign_key.map(str::to_string).unwrap_or_else(|| self.schema.foreign_key()),
            local_key: local_key.unwrap_or(self.schema.primary_key).to_string(),
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    pub fn has_many<R: ModelDefinition>(&self, foreign_key: Option<&str>, local_key: Option<&str>) -> OrmResult<Relation> {
        let kind = RelationKind::HasMany {
            foreign_key: foreign_key.map(str::to_string).unwrap_or_else(|| self.schema.foreign_key()),
            local_key: local_key.unwrap_or(self.schema.primary_key).to_string(),
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    /// The `R` this model points at. `relation` is the relation's name and
    /// gives the default foreign key `{relation}_{owner_key}`.
    pub fn belongs_to<R: ModelDefinition>(
        &self,
        relation: &str,
        foreign_key: Option<&str>,
        owner_key: Option<&str>,
    ) -> OrmResult<Relation> {
        let owner_key = owner_key.unwrap_or(R::primary_key()).to_string();
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", inference::snake_name(relation), owner_key));
        let kind = RelationKind::BelongsTo {
            relation: relation.to_string(),
            foreign_key,
            owner_key,
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    /// Many-to-many through `pivot_table` (default: both singular snake
    /// names in alphabetical order, e.g. `product_tag`)
    pub fn belongs_to_many<R: ModelDefinition>(
        &self,
        pivot_table: Option<&str>,
        foreign_pivot_key: Option<&str>,
        related_pivot_key: Option<&str>,
    ) -> OrmResult<Relation> {
        self.belongs_to_many_with_pivot::<R>(pivot_table, foreign_pivot_key, related_pivot_key, &[])
    }

    /// As [`belongs_to_many`](Self::belongs_to_many), also exposing
    /// `pivot_columns` through [`Model::pivot`] on each related model
    pub fn belongs_to_many_with_pivot<R: ModelDefinition>(
        &self,
        pivot_table: Option<&str>,
        foreign_pivot_key: Option<&str>,
        related_pivot_key: Option<&str>,
        pivot_columns: &[&str],
    ) -> OrmResult<Relation> {
        let kind = RelationKind::BelongsToMany {
            pivot_table: pivot_table
                .map(str::to_string)
                .unwrap_or_else(|| inference::pivot_table(self.schema.class, R::CLASS)),
            foreign_pivot_key: foreign_pivot_key
                .map(str::to_string)
                .unwrap_or_else(|| self.schema.foreign_key()),
            related_pivot_key: related_pivot_key
                .map(str::to_string)
                .unwrap_or_else(|| inference::foreign_key(R::CLASS)),
            parent_key: self.schema.primary_key.to_string(),
            related_key: R::primary_key().to_string(),
            pivot_columns: pivot_columns.iter().map(|c| c.to_string()).collect(),
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    /// One `R` whose `{name}_id` / `{name}_type` point at this model
    pub fn morph_one<R: ModelDefinition>(&self, name: &str) -> OrmResult<Relation> {
        let (type_column, id_column) = inference::morph_columns(name);
        let kind = RelationKind::MorphOne {
            type_column,
            id_column,
            morph_class: self.schema.morph_class.to_string(),
            local_key: self.schema.primary_key.to_string(),
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    pub fn morph_many<R: ModelDefinition>(&self, name: &str) -> OrmResult<Relation> {
        let (type_column, id_column) = inference::morph_columns(name);
        let kind = RelationKind::MorphMany {
            type_column,
            id_column,
            morph_class: self.schema.morph_class.to_string(),
            local_key: self.schema.primary_key.to_string(),
        };
        Ok(Relation::new(kind, self, Some(self.related_builder::<R>()?)))
    }

    /// The owner named by this model's `{name}_type` / `{name}_id`, resolved
    /// through the context's morph map
    pub fn morph_to(&self, name: &str) -> OrmResult<Relation> {
        let (type_column, id_column) = inference::morph_columns(name);
        let kind = RelationKind::MorphTo {
            name: name.to_string(),
            type_column,
            id_column,
        };
        Ok(Relation::new(kind, self, None))
    }

    /// The relation this model's definition declares under `name`
    pub fn relation(&self, name: &str) -> OrmResult<Relation> {
        (self.schema.relation)(self, name).unwrap_or_else(|| {
            Err(ModelError::RelationshipContract(format!(
                "Call to undefined relationship [{}] on model [{}]",
                name, self.schema.class
            )))
        })
    }

    /// Load a relation if it is not cached yet and return it
    pub async fn related(&mut self, name: &str) -> OrmResult<&Related> {
        if !self.relations.contains_key(name) {
            let related = self.relation(name)?.get_results().await?;
            self.relations.insert(name.to_string(), related);
        }
        self.relations.get(name).ok_or_else(|| {
            ModelError::RelationshipContract(format!("Relation [{}] was not cached", name))
        })
    }

    /// Eager load relations onto this model (reloading ones already loaded)
    pub async fn load(&mut self, relations: &[&str]) -> OrmResult<()> {
        let loads = EagerLoad::parse(relations);
        let mut models = vec![self];
        eager::load_relations(&mut models, &loads).await
    }
}
