//! Ordered collections of models or any other items

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use crate::error::OrmResult;
use crate::model::Model;
use crate::relationships::eager::{self, EagerLoad};
use crate::value::Value;

/// Insertion-ordered, non-unique sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn all(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Collection<U> {
        Collection::new(self.items.into_iter().map(f).collect())
    }

    pub fn filter<F: FnMut(&T) -> bool>(self, mut f: F) -> Self {
        Self::new(self.items.into_iter().filter(|item| f(item)).collect())
    }

    pub fn each<F: FnMut(&T)>(&self, f: F) -> &Self {
        self.items.iter().for_each(f);
        self
    }

    pub fn fold<A, F: FnMut(A, &T) -> A>(&self, init: A, f: F) -> A {
        self.items.iter().fold(init, f)
    }

    /// Stable sort
    pub fn sort_by<F>(mut self, f: F) -> Self
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.sort_by(f);
        self
    }

    pub fn sort_by_key<K: Ord, F: FnMut(&T) -> K>(mut self, f: F) -> Self {
        self.items.sort_by_key(f);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.items.reverse();
        self
    }

    pub fn take(self, count: usize) -> Self {
        Self::new(self.items.into_iter().take(count).collect())
    }

    pub fn skip(self, count: usize) -> Self {
        Self::new(self.items.into_iter().skip(count).collect())
    }

    /// Split into collections of at most `size` items; `size` 0 yields none
    pub fn chunk(self, size: usize) -> Vec<Collection<T>>
    where
        T: Clone,
    {
        if size == 0 {
            return Vec::new();
        }
        self.items.chunks(size).map(|c| Collection::new(c.to_vec())).collect()
    }

    /// Keep the first item for each key
    pub fn unique_by<K, F>(self, mut f: F) -> Self
    where
        K: Eq + Hash,
        F: FnMut(&T) -> K,
    {
        let mut seen = HashSet::new();
        Self::new(self.items.into_iter().filter(|item| seen.insert(f(item))).collect())
    }

    pub fn find<F: FnMut(&T) -> bool>(&self, mut f: F) -> Option<&T> {
        self.items.iter().find(|item| f(item))
    }

    pub fn contains<F: FnMut(&T) -> bool>(&self, f: F) -> bool {
        self.items.iter().any(f)
    }

    pub fn sum<F: FnMut(&T) -> f64>(&self, f: F) -> f64 {
        self.items.iter().map(f).sum()
    }

    pub fn partition<F: FnMut(&T) -> bool>(self, f: F) -> (Self, Self) {
        let (pass, fail): (Vec<T>, Vec<T>) = self.items.into_iter().partition(f);
        (Self::new(pass), Self::new(fail))
    }

    pub fn group_by<F: FnMut(&T) -> String>(self, mut f: F) -> BTreeMap<String, Collection<T>> {
        let mut groups: BTreeMap<String, Collection<T>> = BTreeMap::new();
        for item in self.items {
            groups.entry(f(&item)).or_default().push(item);
        }
        groups
    }

    pub fn to_json(&self) -> JsonValue
    where
        T: Serialize,
    {
        serde_json::to_value(&self.items).unwrap_or(JsonValue::Null)
    }
}

impl Collection<Model> {
    /// Primary keys in collection order
    pub fn model_keys(&self) -> Vec<Value> {
        self.items.iter().map(Model::key).collect()
    }

    /// Model whose primary key equals `key`
    pub fn find_key(&self, key: impl Into<Value>) -> Option<&Model> {
        let wanted = key.into().key_string();
        wanted.as_ref()?;
        self.items.iter().find(|model| model.key().key_string() == wanted)
    }

    /// One attribute from every model
    pub fn pluck(&self, attribute: &str) -> Vec<Value> {
        self.items.iter().map(|model| model.get_attribute(attribute)).collect()
    }

    /// Eager load relations onto every model in one query per relation
    pub async fn load(&mut self, relations: &[&str]) -> OrmResult<()> {
        let loads = EagerLoad::parse(relations);
        let mut models: Vec<&mut Model> = self.items.iter_mut().collect();
        eager::load_relations(&mut models, &loads).await
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
