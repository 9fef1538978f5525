//! Eager loading
//!
//! Requested relation paths are parsed into a tree (`orders.items` loads
//! `orders`, then `items` on every loaded order). Each level issues one
//! query per relation regardless of how many parents there are.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::error::OrmResult;
use crate::model::{Builder, Model};

/// Extra condition applied to a relation's query
#[derive(Clone)]
pub struct Constraint(Arc<dyn Fn(Builder) -> Builder + Send + Sync>);

impl Constraint {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Builder) -> Builder + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, builder: Builder) -> Builder {
        (self.0)(builder)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Constraint")
    }
}

/// One relation to load, with the relations to load beneath it
#[derive(Debug, Clone)]
pub struct EagerLoad {
    pub name: String,
    pub constraint: Option<Constraint>,
    pub nested: Vec<EagerLoad>,
}

impl EagerLoad {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: None,
            nested: Vec::new(),
        }
    }

    /// `["orders.items", "customer"]` -> `orders { items }`, `customer`
    pub fn parse(paths: &[&str]) -> Vec<EagerLoad> {
        let mut loads = Vec::new();
        for path in paths {
            Self::insert_path(&mut loads, path);
        }
        loads
    }

    /// Ensure every segment of `path` is present and return the last one
    fn insert_path<'l>(loads: &'l mut Vec<EagerLoad>, path: &str) -> Option<&'l mut EagerLoad> {
        let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut node = Self::child(loads, first);
        for segment in segments {
            node = Self::child(&mut node.nested, segment);
        }
        Some(node)
    }

    fn child<'l>(loads: &'l mut Vec<EagerLoad>, name: &str) -> &'l mut EagerLoad {
        let index = match loads.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                loads.push(Self::named(name));
                loads.len() - 1
            }
        };
        &mut loads[index]
    }

    /// Merge `other` into `loads`, keeping existing constraints
    pub fn merge(loads: &mut Vec<EagerLoad>, other: &[EagerLoad]) {
        for load in other {
            let node = Self::child(loads, &load.name);
            if load.constraint.is_some() {
                node.constraint = load.constraint.clone();
            }
            Self::merge(&mut node.nested, &load.nested);
        }
    }

    /// Attach `constraint` to the relation at `path`, adding it if needed
    pub fn constrain(loads: &mut Vec<EagerLoad>, path: &str, constraint: Constraint) {
        if let Some(node) = Self::insert_path(loads, path) {
            node.constraint = Some(constraint);
        }
    }
}

/// Load `loads` onto `models`, level by level
pub(crate) fn load_relations<'a, 'b>(
    models: &'a mut [&'b mut Model],
    loads: &'a [EagerLoad],
) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        if models.is_empty() {
            return Ok(());
        }
        for load in loads {
            let relation = models[0].relation(&load.name)?;
            let relation = match &load.constraint {
                Some(constraint) => relation.with_constraint(constraint.clone()),
                None => relation,
            };

            tracing::debug!(
                model = models[0].class(),
                relation = %load.name,
                parents = models.len(),
                "Eager loading relation"
            );
            relation.eager_load(&load.name, models).await?;

            if !load.nested.is_empty() {
                let mut children: Vec<&mut Model> = models
                    .iter_mut()
                    .flat_map(|m| m.related_models_mut(&load.name))
                    .collect();
                load_relations(&mut children, &load.nested).await?;
            }
        }
        Ok(())
    })
}
