use crate::event_error::EventError;
use crate::events::{ModelEvent, ModelObserver};
use crate::model::Model;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};

/// Ordered list of observers
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn ModelObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn ModelObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Run `event` on every observer in registration order, stopping at the
    /// first error
    pub async fn trigger(&self, event: ModelEvent, model: &mut Model) -> Result<(), EventError> {
        for observer in &self.observers {
            match event {
                ModelEvent::Saving => observer.saving(model).await?,
                ModelEvent::Saved => observer.saved(model).await?,
                ModelEvent::Creating => observer.creating(model).await?,
                ModelEvent::Created => observer.created(model).await?,
                ModelEvent::Updating => observer.updating(model).await?,
                ModelEvent::Updated => observer.updated(model).await?,
                ModelEvent::Deleting => observer.deleting(model).await?,
                ModelEvent::Deleted => observer.deleted(model).await?,
                ModelEvent::Restoring => observer.restoring(model).await?,
                ModelEvent::Restored => observer.restored(model).await?,
            }
        }
        Ok(())
    }
}

/// Routes model events to observers registered for the model's class and
/// to global observers that see every model. Class observers run first.
#[derive(Default)]
pub struct EventDispatcher {
    model_observers: DashMap<String, ObserverRegistry>,
    global_observers: RwLock<ObserverRegistry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe models whose class name is `class`
    pub fn observe(&self, class: &str, observer: Arc<dyn ModelObserver>) {
        self.model_observers
            .entry(class.to_string())
            .or_default()
            .register(observer);
    }

    pub fn observe_all(&self, observer: Arc<dyn ModelObserver>) {
        if let Ok(mut global) = self.global_observers.write() {
            global.register(observer);
        }
    }

    pub fn has_observers_for(&self, class: &str) -> bool {
        self.model_observers.contains_key(class)
    }

    pub fn global_observer_count(&self) -> usize {
        self.global_observers.read().map(|g| g.observer_count()).unwrap_or(0)
    }

    pub fn forget(&self, class: &str) {
        self.model_observers.remove(class);
    }

    pub async fn dispatch(&self, event: ModelEvent, model: &mut Model) -> Result<(), EventError> {
        // snapshot so no lock is held across the awaits below
        let scoped = self.model_observers.get(model.class()).map(|r| r.clone());
        let global = self.global_observers.read().map(|g| g.clone()).unwrap_or_default();

        if let Some(registry) = scoped {
            registry.trigger(event, model).await?;
        }
        global.trigger(event, model).await
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observed_classes", &self.model_observers.len())
            .field("global_observers", &self.global_observer_count())
            .finish()
    }
}
