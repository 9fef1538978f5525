//! Model core - attribute storage, casting and dirty tracking

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ModelError, OrmResult};
use crate::model::casts;
use crate::model::context::ModelContext;
use crate::model::definition::{ModelDefinition, ModelSchema};
use crate::relationships::Related;
use crate::result::Row;
use crate::value::Value;

/// One row of one table
#[derive(Clone)]
pub struct Model {
    pub(crate) schema: ModelSchema,
    pub(crate) ctx: ModelContext,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) original: BTreeMap<String, Value>,
    pub(crate) changes: BTreeMap<String, Value>,
    pub(crate) relations: BTreeMap<String, Related>,
    pub(crate) pivot: Option<BTreeMap<String, Value>>,
    pub(crate) exists: bool,
    pub(crate) was_recently_created: bool,
}

/// What [`Model::resolve`] found for a key
#[derive(Debug, Clone)]
pub enum Resolved {
    Value(Value),
    Relation(Related),
}

impl Resolved {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Relation(_) => None,
        }
    }

    pub fn into_related(self) -> Option<Related> {
        match self {
            Resolved::Relation(related) => Some(related),
            Resolved::Value(_) => None,
        }
    }
}

impl Model {
    /// Fresh, unsaved model of the entity described by `schema`
    pub fn new(schema: ModelSchema, ctx: ModelContext) -> Self {
        Self {
            schema,
            ctx,
            attributes: BTreeMap::new(),
            original: BTreeMap::new(),
            changes: BTreeMap::new(),
            relations: BTreeMap::new(),
            pivot: None,
            exists: false,
            was_recently_created: false,
        }
    }

    pub fn of<D: ModelDefinition>(ctx: &ModelContext) -> Self {
        Self::new(ModelSchema::of::<D>(), ctx.clone())
    }

    /// Model for a row that was just read from the database
    pub fn from_row(schema: ModelSchema, ctx: ModelContext, row: Row) -> Self {
        let attributes = row.into_map();
        Self {
            original: attributes.clone(),
            attributes,
            exists: true,
            ..Self::new(schema, ctx)
        }
    }

    /// Unsaved model filled from a typed struct. Every serialized field is
    /// force-filled.
    pub fn from_entity<D: ModelDefinition, T: Serialize>(ctx: &ModelContext, entity: &T) -> OrmResult<Self> {
        let json = serde_json::to_value(entity)?;
        let JsonValue::Object(fields) = json else {
            return Err(ModelError::Serialization(format!(
                "{} entity must serialize to an object",
                D::CLASS
            )));
        };
        let mut model = Self::of::<D>(ctx);
        model.force_fill(fields.into_iter().map(|(k, v)| (k, Value::from_json(v))));
        Ok(model)
    }

    /// Deserialize the cast attributes into a typed struct
    pub fn into_entity<T: DeserializeOwned>(&self) -> OrmResult<T> {
        let map: Map<String, JsonValue> = self
            .attributes
            .keys()
            .map(|key| (key.clone(), self.get_attribute(key).to_json()))
            .collect();
        Ok(serde_json::from_value(JsonValue::Object(map))?)
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn context(&self) -> &ModelContext {
        &self.ctx
    }

    pub fn class(&self) -> &'static str {
        self.schema.class
    }

    pub fn table(&self) -> String {
        self.schema.table()
    }

    pub fn key_name(&self) -> &'static str {
        self.schema.primary_key
    }

    /// Primary key value, `Null` while unset
    pub fn key(&self) -> Value {
        self.attributes.get(self.schema.primary_key).cloned().unwrap_or_default()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// True right after `save` inserted this model
    pub fn was_recently_created(&self) -> bool {
        self.was_recently_created
    }

    /// Mass-assign attributes that pass the fillable/guarded rules; the rest
    /// are skipped
    pub fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in attributes {
            let key = key.into();
            if self.schema.is_fillable(&key) {
                self.set_attribute(&key, value);
            } else {
                tracing::debug!(model = self.schema.class, attribute = %key, "Skipping guarded attribute");
            }
        }
        self
    }

    /// Assign attributes without the mass-assignment guard
    pub fn force_fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in attributes {
            let key = key.into();
            self.set_attribute(&key, value);
        }
        self
    }

    pub fn is_fillable(&self, key: &str) -> bool {
        self.schema.is_fillable(key)
    }

    /// Store a value, passing it through the entity's mutator first
    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let value = (self.schema.mutator)(key, &value).unwrap_or(value);
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Accessor, then cast, then the stored value, then `Null`
    pub fn get_attribute(&self, key: &str) -> Value {
        if let Some(value) = (self.schema.accessor)(self, key) {
            return value;
        }
        match self.attributes.get(key) {
            Some(raw) => casts::apply(self.schema.cast_for(key), raw),
            None => Value::Null,
        }
    }

    /// Stored value without accessor or cast
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Attribute lookup that falls back to relations: a loaded relation of
    /// that name, then the entity's relation hook (loaded and cached).
    pub async fn resolve(&mut self, key: &str) -> OrmResult<Resolved> {
        if self.has_attribute(key) {
            return Ok(Resolved::Value(self.get_attribute(key)));
        }
        if let Some(value) = (self.schema.accessor)(self, key) {
            return Ok(Resolved::Value(value));
        }
        if let Some(related) = self.relations.get(key) {
            return Ok(Resolved::Relation(related.clone()));
        }
        match (self.schema.relation)(self, key) {
            Some(relation) => {
                let related = relation?.get_results().await?;
                self.relations.insert(key.to_string(), related.clone());
                Ok(Resolved::Relation(related))
            }
            None => Ok(Resolved::Value(Value::Null)),
        }
    }

    /// Subset of the attributes, cast
    pub fn only(&self, keys: &[&str]) -> BTreeMap<String, Value> {
        keys.iter()
            .map(|key| (key.to_string(), self.get_attribute(key)))
            .collect()
    }

    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.get(key)
    }

    pub fn original(&self) -> &BTreeMap<String, Value> {
        &self.original
    }

    /// Attributes whose value differs from the last synced snapshot. A key
    /// missing from the snapshot counts as changed.
    pub fn get_dirty(&self) -> BTreeMap<String, Value> {
        self.attributes
            .iter()
            .filter(|(key, value)| match self.original.get(*key) {
                Some(original) => !value.is_equivalent(original),
                None => true,
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Any attribute dirty, or the named one with `Some(key)`
    pub fn is_dirty(&self, key: Option<&str>) -> bool {
        let dirty = self.get_dirty();
        match key {
            Some(key) => dirty.contains_key(key),
            None => !dirty.is_empty(),
        }
    }

    pub fn is_clean(&self, key: Option<&str>) -> bool {
        !self.is_dirty(key)
    }

    /// Whether the last save changed any attribute, or the named one
    pub fn was_changed(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) => self.changes.contains_key(key),
            None => !self.changes.is_empty(),
        }
    }

    /// Attributes written by the last save
    pub fn get_changes(&self) -> &BTreeMap<String, Value> {
        &self.changes
    }

    /// Take the current attributes as the clean state
    pub fn sync_original(&mut self) -> &mut Self {
        self.original = self.attributes.clone();
        self
    }

    pub(crate) fn sync_changes(&mut self, dirty: BTreeMap<String, Value>) {
        self.changes = dirty;
    }

    pub fn get_relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn set_relation(&mut self, name: &str, related: Related) -> &mut Self {
        self.relations.insert(name.to_string(), related);
        self
    }

    pub fn unset_relation(&mut self, name: &str) -> Option<Related> {
        self.relations.remove(name)
    }

    pub fn relations(&self) -> &BTreeMap<String, Related> {
        &self.relations
    }

    /// Mutable access to the models loaded under `name`, for nested loading
    pub(crate) fn related_models_mut(&mut self, name: &str) -> Vec<&mut Model> {
        self.relations
            .get_mut(name)
            .map(|related| related.models_mut())
            .unwrap_or_default()
    }

    /// Pivot row columns for a model loaded through a many-to-many relation
    pub fn pivot(&self) -> Option<&BTreeMap<String, Value>> {
        self.pivot.as_ref()
    }

    /// Move `prefix`-ed columns out of the attributes into the pivot
    pub(crate) fn take_pivot(&mut self, prefix: &str) {
        let keys: Vec<String> = self
            .attributes
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        if keys.is_empty() {
            return;
        }
        let mut pivot = BTreeMap::new();
        for key in keys {
            if let Some(value) = self.attributes.remove(&key) {
                self.original.remove(&key);
                pivot.insert(key[prefix.len()..].to_string(), value);
            }
        }
        self.pivot = Some(pivot);
    }

    /// Soft-deleted and still in the table
    pub fn trashed(&self) -> bool {
        self.schema
            .soft_delete_column
            .map(|column| !self.get_raw(column).map(Value::is_null).unwrap_or(true))
            .unwrap_or(false)
    }

    /// Unsaved copy without the key, timestamps and the `except` attributes
    pub fn replicate(&self, except: &[&str]) -> Model {
        let mut skip = vec![self.schema.primary_key, "created_at", "updated_at"];
        skip.extend(self.schema.soft_delete_column);
        skip.extend_from_slice(except);

        let mut copy = Model::new(self.schema, self.ctx.clone());
        copy.attributes = self
            .attributes
            .iter()
            .filter(|(key, _)| !skip.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        copy.relations = self.relations.clone();
        copy
    }

    /// Cast attributes without hidden ones, followed by loaded relations and
    /// the pivot row
    pub fn to_array(&self) -> Map<String, JsonValue> {
        let mut out: Map<String, JsonValue> = self
            .attributes
            .keys()
            .filter(|key| !self.schema.is_hidden(key))
            .map(|key| (key.clone(), self.get_attribute(key).to_json()))
            .collect();
        for (name, related) in &self.relations {
            if !self.schema.is_hidden(name) {
                out.insert(name.clone(), related.to_json());
            }
        }
        if let Some(pivot) = &self.pivot {
            let pivot = pivot.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
            out.insert("pivot".to_string(), JsonValue::Object(pivot));
        }
        out
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_array())
    }

    /// Same row: same table, same connection and same key
    pub fn is(&self, other: &Model) -> bool {
        !self.key().is_null()
            && self.key().key_string() == other.key().key_string()
            && self.schema == other.schema
            && self.ctx.connection().name() == other.ctx.connection().name()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.schema.class)
            .field("exists", &self.exists)
            .field("attributes", &self.attributes)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}
