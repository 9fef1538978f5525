use serde_json::Value as JsonValue;

use crate::collection::Collection;
use crate::model::Model;

/// Result of loading a relation, cached on the parent model
#[derive(Debug, Clone)]
pub enum Related {
    /// Single-model relation that found its row
    One(Box<Model>),
    /// Single-model relation that found nothing
    Empty,
    Many(Collection<Model>),
}

impl Related {
    pub fn from_option(model: Option<Model>) -> Self {
        match model {
            Some(model) => Related::One(Box::new(model)),
            None => Related::Empty,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Related::One(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection<Model>> {
        match self {
            Related::Many(models) => Some(models),
            _ => None,
        }
    }

    pub fn into_model(self) -> Option<Model> {
        match self {
            Related::One(model) => Some(*model),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Collection<Model> {
        match self {
            Related::One(model) => Collection::new(vec![*model]),
            Related::Empty => Collection::default(),
            Related::Many(models) => models,
        }
    }

    /// Every loaded model, whatever the shape
    pub fn models(&self) -> Vec<&Model> {
        match self {
            Related::One(model) => vec![model.as_ref()],
            Related::Empty => Vec::new(),
            Related::Many(models) => models.iter().collect(),
        }
    }

    pub fn models_mut(&mut self) -> Vec<&mut Model> {
        match self {
            Related::One(model) => vec![model.as_mut()],
            Related::Empty => Vec::new(),
            Related::Many(models) => models.iter_mut().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Related::One(_) => 1,
            Related::Empty => 0,
            Related::Many(models) => models.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Related::One(model) => model.to_json(),
            Related::Empty => JsonValue::Null,
            Related::Many(models) => JsonValue::Array(models.iter().map(Model::to_json).collect()),
        }
    }
}
