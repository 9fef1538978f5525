//! Model definitions - per-entity metadata
//!
//! Each entity is a marker type implementing [`ModelDefinition`]. The
//! runtime [`Model`] carries the type-erased [`ModelSchema`] so models of
//! different entities can share one concrete type.

use std::fmt;

use crate::error::OrmResult;
use crate::model::Model;
use crate::relationships::{inference, Relation};
use crate::value::Value;

/// Primary key column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// Integer key, usually auto-incrementing
    #[default]
    Int,
    /// Text key supplied by the application
    String,
    /// UUID key; a v4 value is generated on insert when none is set
    Uuid,
}

impl KeyType {
    /// Whether `value` is usable as a key of this type
    pub fn is_valid(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (KeyType::Int, v) => v.as_i64().is_some(),
            (KeyType::String, Value::String(s)) => !s.is_empty(),
            (KeyType::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s).map(|u| !u.is_nil()).unwrap_or(false),
            _ => false,
        }
    }
}

/// Static description of one entity. Only `CLASS` is required; every other
/// item has the conventional default.
///
/// ```ignore
/// struct Product;
///
/// impl ModelDefinition for Product {
///     const CLASS: &'static str = "Product";
///
///     fn fillable() -> &'static [&'static str] {
///         &["name", "price", "category_id"]
///     }
///
///     fn casts() -> &'static [(&'static str, &'static str)] {
///         &[("price", "decimal:2"), ("active", "bool")]
///     }
///
///     fn relation(parent: &Model, name: &str) -> Option<OrmResult<Relation>> {
///         match name {
///             "category" => Some(parent.belongs_to::<Category>("category", None, None)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait ModelDefinition: Send + Sync + 'static {
    /// Class name, used for default table and key names, morph types and
    /// observer routing
    const CLASS: &'static str;

    /// Defaults to the plural snake case of the class
    fn table() -> String {
        inference::table_name(Self::CLASS)
    }

    fn primary_key() -> &'static str {
        "id"
    }

    fn key_type() -> KeyType {
        KeyType::Int
    }

    fn incrementing() -> bool {
        true
    }

    /// Mass-assignable attributes. When non-empty only these are fillable.
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Attributes `fill` refuses when `fillable` is empty; `"*"` guards all
    fn guarded() -> &'static [&'static str] {
        &[]
    }

    /// Attributes left out of `to_array` / `to_json`
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    /// `(attribute, cast)` pairs, e.g. `("price", "decimal:2")`
    fn casts() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Maintain `created_at` / `updated_at`
    fn timestamps() -> bool {
        true
    }

    /// Soft deletes are enabled when this names a column
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    /// Named connection; `None` uses the context's connection
    fn connection() -> Option<&'static str> {
        None
    }

    /// Value stored in `{name}_type` columns of polymorphic relations
    fn morph_class() -> &'static str {
        Self::CLASS
    }

    /// Computed or transformed attribute read
    fn accessor(_model: &Model, _key: &str) -> Option<Value> {
        None
    }

    /// Transform a value before it is stored; `None` stores it unchanged
    fn mutator(_key: &str, _value: &Value) -> Option<Value> {
        None
    }

    /// Relations by name; `None` for names this entity does not define
    fn relation(_parent: &Model, _name: &str) -> Option<OrmResult<Relation>> {
        None
    }
}

/// Type-erased copy of a [`ModelDefinition`]
#[derive(Clone, Copy)]
pub struct ModelSchema {
    pub class: &'static str,
    table: fn() -> String,
    pub primary_key: &'static str,
    pub key_type: KeyType,
    pub incrementing: bool,
    pub fillable: &'static [&'static str],
    pub guarded: &'static [&'static str],
    pub hidden: &'static [&'static str],
    pub casts: &'static [(&'static str, &'static str)],
    pub timestamps: bool,
    pub soft_delete_column: Option<&'static str>,
    pub connection: Option<&'static str>,
    pub morph_class: &'static str,
    pub(crate) accessor: fn(&Model, &str) -> Option<Value>,
    pub(crate) mutator: fn(&str, &Value) -> Option<Value>,
    pub(crate) relation: fn(&Model, &str) -> Option<OrmResult<Relation>>,
}

impl ModelSchema {
    pub fn of<D: ModelDefinition>() -> Self {
        Self {
            class: D::CLASS,
            table: D::table,
            primary_key: D::primary_key(),
            key_type: D::key_type(),
            incrementing: D::incrementing(),
            fillable: D::fillable(),
            guarded: D::guarded(),
            hidden: D::hidden(),
            casts: D::casts(),
            timestamps: D::timestamps(),
            soft_delete_column: D::soft_delete_column(),
            connection: D::connection(),
            morph_class: D::morph_class(),
            accessor: D::accessor,
            mutator: D::mutator,
            relation: D::relation,
        }
    }

    pub fn table(&self) -> String {
        (self.table)()
    }

    /// `table.column`
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", self.table(), column)
    }

    pub fn qualified_key(&self) -> String {
        self.qualify(self.primary_key)
    }

    /// Foreign key other tables use to point at this entity, e.g. `order_id`
    pub fn foreign_key(&self) -> String {
        inference::foreign_key(self.class)
    }

    pub fn uses_soft_deletes(&self) -> bool {
        self.soft_delete_column.is_some()
    }

    pub fn cast_for(&self, key: &str) -> Option<&'static str> {
        self.casts.iter().find(|(k, _)| *k == key).map(|(_, cast)| *cast)
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(&key)
    }

    /// Mass-assignment rule: an explicit `fillable` list wins, otherwise
    /// everything not guarded (and no `"*"` guard) is fillable
    pub fn is_fillable(&self, key: &str) -> bool {
        if !self.fillable.is_empty() {
            return self.fillable.contains(&key);
        }
        !self.guarded.contains(&"*") && !self.guarded.contains(&key)
    }
}

impl PartialEq for ModelSchema {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.table() == other.table()
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("class", &self.class)
            .field("table", &self.table())
            .field("primary_key", &self.primary_key)
            .field("key_type", &self.key_type)
            .field("soft_delete_column", &self.soft_delete_column)
            .finish()
    }
}
