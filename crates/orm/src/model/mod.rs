//! Model System - Active Record models over the query builder
//!
//! - `definition`: per-entity metadata ([`ModelDefinition`]) and its
//!   type-erased [`ModelSchema`]
//! - `core`: the runtime [`Model`] with attributes, casts and dirty tracking
//! - `persistence`: save, delete, restore and refresh with lifecycle events
//! - `builder`: model-aware query builder with soft-delete scoping and eager loading
//! - `queries`: static entry points such as `Product::find(&ctx, 1)`
//! - `relations`: relationship factories used from a definition's relation hook

pub mod builder;
pub mod casts;
pub mod context;
pub mod core;
pub mod definition;
pub mod persistence;
pub mod queries;
pub mod relations;

pub use builder::{Builder, TrashedScope};
pub use casts::CastType;
pub use context::{ModelContext, MorphMap};
pub use core::{Model, Resolved};
pub use definition::{KeyType, ModelDefinition, ModelSchema};
pub use queries::{attributes, ModelQueries};
