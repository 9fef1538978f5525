use crate::event_error::EventError;
use crate::model::Model;
use async_trait::async_trait;
use std::fmt;

/// Lifecycle points at which observers run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Saving,
    Saved,
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
    Restoring,
    Restored,
}

impl ModelEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelEvent::Saving => "saving",
            ModelEvent::Saved => "saved",
            ModelEvent::Creating => "creating",
            ModelEvent::Created => "created",
            ModelEvent::Updating => "updating",
            ModelEvent::Updated => "updated",
            ModelEvent::Deleting => "deleting",
            ModelEvent::Deleted => "deleted",
            ModelEvent::Restoring => "restoring",
            ModelEvent::Restored => "restored",
        }
    }

    /// "-ing" events run before the statement and may cancel it
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            ModelEvent::Saving | ModelEvent::Creating | ModelEvent::Updating | ModelEvent::Deleting | ModelEvent::Restoring
        )
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooks into model persistence.
///
/// Returning [`EventError::PropagationStopped`] from a cancellable hook
/// aborts the operation; any other error is propagated to the caller.
/// During `updating` the pre-change values are available through
/// [`Model::get_original`].
#[async_trait]
pub trait ModelObserver: Send + Sync {
    async fn saving(&self, _model: &mut Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn saved(&self, _model: &Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn creating(&self, _model: &mut Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn created(&self, _model: &Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn updating(&self, _model: &mut Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn updated(&self, _model: &Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleting(&self, _model: &mut Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn deleted(&self, _model: &Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn restoring(&self, _model: &mut Model) -> Result<(), EventError> {
        Ok(())
    }

    async fn restored(&self, _model: &Model) -> Result<(), EventError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(ModelEvent::Restoring.to_string(), "restoring");
        assert!(ModelEvent::Saving.is_cancellable());
        assert!(ModelEvent::Deleting.is_cancellable());
        assert!(!ModelEvent::Saved.is_cancellable());
        assert!(!ModelEvent::Restored.is_cancellable());
    }
}
