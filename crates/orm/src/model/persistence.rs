//! Model persistence - save, delete and restore with lifecycle events

use futures::future::BoxFuture;
use std::collections::BTreeMap;

use crate::error::{ModelError, OrmResult};
use crate::events::ModelEvent;
use crate::model::builder::now;
use crate::model::definition::KeyType;
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::relationships::EagerLoad;
use crate::value::Value;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

impl Model {
    /// Dispatch `event` to the context's observers. `Ok(false)` means an
    /// observer stopped a cancellable operation.
    async fn fire(&mut self, event: ModelEvent) -> OrmResult<bool> {
        let events = self.ctx.events().clone();
        match events.dispatch(event, self).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_propagation_stopped() => {
                tracing::debug!(model = self.schema.class, event = %event, "Observer stopped propagation");
                Ok(!event.is_cancellable())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Table query on the entity's connection, without any scope
    fn new_query(&self) -> OrmResult<QueryBuilder> {
        let conn = self.ctx.connection_for(&self.schema)?;
        Ok(QueryBuilder::table(conn, self.schema.table()))
    }

    /// Key the row was loaded with, so a changed key still finds its row
    fn key_for_save(&self) -> OrmResult<Value> {
        let key = self
            .original
            .get(self.schema.primary_key)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| self.key());
        if key.is_null() {
            return Err(ModelError::MissingPrimaryKey);
        }
        Ok(key)
    }

    fn key_query(&self) -> OrmResult<QueryBuilder> {
        let key = self.key_for_save()?;
        Ok(self.new_query()?.where_(self.schema.primary_key, key))
    }

    fn set_timestamp(&mut self, column: &str, value: &Value) {
        self.attributes.insert(column.to_string(), value.clone());
    }

    /// INSERT when the model is new, UPDATE of the dirty columns otherwise.
    /// `Ok(false)` when an observer cancelled or the row no longer exists.
    pub async fn save(&mut self) -> OrmResult<bool> {
        let query = self.new_query()?;

        if !self.fire(ModelEvent::Saving).await? {
            return Ok(false);
        }

        let saved = if self.exists {
            self.perform_update(query).await?
        } else {
            self.perform_insert(query).await?
        };

        if saved {
            self.fire(ModelEvent::Saved).await?;
            self.sync_original();
        }
        Ok(saved)
    }

    async fn perform_update(&mut self, query: QueryBuilder) -> OrmResult<bool> {
        if !self.is_dirty(None) {
            return Ok(true);
        }
        if !self.fire(ModelEvent::Updating).await? {
            return Ok(false);
        }
        if self.schema.timestamps && !self.is_dirty(Some(UPDATED_AT)) {
            self.set_timestamp(UPDATED_AT, &Value::DateTime(now()));
        }

        let dirty = self.get_dirty();
        if dirty.is_empty() {
            return Ok(true);
        }

        let key = self.key_for_save()?;
        let affected = query
            .where_(self.schema.primary_key, key)
            .update(dirty.clone())
            .await?;
        if affected == 0 {
            tracing::warn!(model = self.schema.class, key = %self.key(), "Update matched no rows");
            return Ok(false);
        }

        self.sync_changes(dirty);
        self.fire(ModelEvent::Updated).await?;
        Ok(true)
    }

    async fn perform_insert(&mut self, query: QueryBuilder) -> OrmResult<bool> {
        if !self.fire(ModelEvent::Creating).await? {
            return Ok(false);
        }

        if self.schema.timestamps {
            let stamp = Value::DateTime(now());
            if !self.is_dirty(Some(UPDATED_AT)) {
                self.set_timestamp(UPDATED_AT, &stamp);
            }
            if !self.is_dirty(Some(CREATED_AT)) {
                self.set_timestamp(CREATED_AT, &stamp);
            }
        }

        let primary_key = self.schema.primary_key;
        if self.schema.key_type == KeyType::Uuid && self.key().is_null() {
            self.attributes
                .insert(primary_key.to_string(), Value::from(uuid::Uuid::new_v4()));
        }

        let attributes = self.attributes.clone();
        if self.schema.incrementing && self.key().is_null() {
            if let Some(id) = query.insert_get_id(attributes, primary_key).await? {
                self.attributes.insert(primary_key.to_string(), Value::Int(id));
            }
        } else {
            query.insert(attributes).await?;
        }

        self.exists = true;
        self.was_recently_created = true;
        self.sync_changes(BTreeMap::new());
        self.fire(ModelEvent::Created).await?;
        Ok(true)
    }

    /// Delete the row, softly when the entity declares a deleted-at column.
    /// `Ok(None)` when the model was never saved, `Ok(Some(false))` when an
    /// observer cancelled.
    pub async fn delete(&mut self) -> OrmResult<Option<bool>> {
        if !self.exists {
            return Ok(None);
        }
        // fail before observers run
        self.key_for_save()?;

        if !self.fire(ModelEvent::Deleting).await? {
            return Ok(Some(false));
        }

        match self.schema.soft_delete_column {
            Some(column) => {
                if !self.run_soft_delete(column).await? {
                    return Ok(Some(false));
                }
            }
            None => self.run_hard_delete().await?,
        }

        self.fire(ModelEvent::Deleted).await?;
        Ok(Some(true))
    }

    /// Hard delete, even for soft-deletable entities
    pub async fn force_delete(&mut self) -> OrmResult<Option<bool>> {
        if !self.exists {
            return Ok(None);
        }
        self.key_for_save()?;

        if !self.fire(ModelEvent::Deleting).await? {
            return Ok(Some(false));
        }
        self.run_hard_delete().await?;
        self.fire(ModelEvent::Deleted).await?;
        Ok(Some(true))
    }

    async fn run_hard_delete(&mut self) -> OrmResult<()> {
        self.key_query()?.delete().await?;
        self.exists = false;
        Ok(())
    }

    /// Stamp the deleted-at column and save, so pending changes go out
    /// with it
    async fn run_soft_delete(&mut self, column: &str) -> OrmResult<bool> {
        let previous = self.attributes.get(column).cloned();
        self.set_timestamp(column, &Value::DateTime(now()));
        if self.save().await? {
            return Ok(true);
        }
        match previous {
            Some(value) => self.attributes.insert(column.to_string(), value),
            None => self.attributes.remove(column),
        };
        Ok(false)
    }

    /// Bring a soft-deleted model back. `Ok(false)` when it is not trashed
    /// or an observer cancelled.
    pub async fn restore(&mut self) -> OrmResult<bool> {
        let Some(column) = self.schema.soft_delete_column else {
            return Err(ModelError::Validation(format!(
                "{} does not use soft deletes",
                self.schema.class
            )));
        };
        if !self.trashed() {
            return Ok(false);
        }
        if !self.fire(ModelEvent::Restoring).await? {
            return Ok(false);
        }

        self.attributes.insert(column.to_string(), Value::Null);
        let saved = self.save().await?;
        if saved {
            self.fire(ModelEvent::Restored).await?;
        }
        Ok(saved)
    }

    /// Reload attributes from the database, and reload any relations that
    /// were loaded
    pub async fn refresh(&mut self) -> OrmResult<()> {
        if !self.exists {
            return Ok(());
        }
        let key = self.key_for_save()?;
        let row = self
            .key_query()?
            .first()
            .await?
            .ok_or_else(|| ModelError::not_found(self.schema.class, vec![key.to_string()]))?;

        self.attributes = row.into_map();
        self.sync_original();

        let loaded: Vec<String> = self.relations.keys().cloned().collect();
        if !loaded.is_empty() {
            let names: Vec<&str> = loaded.iter().map(String::as_str).collect();
            let loads = EagerLoad::parse(&names);
            let mut models = vec![&mut *self];
            crate::relationships::eager::load_relations(&mut models, &loads).await?;
        }
        Ok(())
    }

    /// A new instance of this row read from the database; `None` when the
    /// model is unsaved or its row is gone
    pub async fn fresh(&self) -> OrmResult<Option<Model>> {
        if !self.exists {
            return Ok(None);
        }
        let key = self.key_for_save()?;
        let mut builder = crate::model::Builder::new(self.schema, self.ctx.clone())?.with_trashed();
        if !self.relations.is_empty() {
            let names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
            builder = builder.with(&names);
        }
        builder.find(key).await
    }

    /// Bump `updated_at` and save
    pub async fn touch(&mut self) -> OrmResult<bool> {
        if !self.schema.timestamps {
            return Ok(false);
        }
        self.set_timestamp(UPDATED_AT, &Value::DateTime(now()));
        self.save().await
    }

    /// Fill and save an existing model
    pub async fn update<I, K, V>(&mut self, attributes: I) -> OrmResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if !self.exists {
            return Ok(false);
        }
        self.fill(attributes);
        self.save().await
    }

    /// Save this model and every loaded related model, depth first
    pub fn push(&mut self) -> BoxFuture<'_, OrmResult<bool>> {
        Box::pin(async move {
            if !self.save().await? {
                return Ok(false);
            }
            for related in self.relations.values_mut() {
                for model in related.models_mut() {
                    if !model.push().await? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        })
    }
}
