//! Relationships Module - relation queries, eager loading and naming rules
//!
//! - `relation`: the [`Relation`] query for each kind plus the eager match step
//! - `eager`: parsing of `with(...)` paths and level-by-level loading
//! - `related`: the loaded result cached on a parent model
//! - `inference`: default table, foreign key and pivot names

pub mod eager;
pub mod inference;
pub mod related;
pub mod relation;

pub use eager::{Constraint, EagerLoad};
pub use related::Related;
pub use relation::{Relation, RelationKind, SyncChanges};
