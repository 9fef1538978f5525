use thiserror::Error;

use crate::error::ModelError;

/// Failure raised by a model observer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    #[error("Validation error: {message}{}", .hint.as_ref().map(|h| format!(" (hint: {})", h)).unwrap_or_default())]
    Validation { message: String, hint: Option<String> },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Observer error: {message}")]
    Observer { message: String },

    /// Cancels the operation that fired the event. `save`, `delete` and
    /// `restore` report this as `false` instead of an error.
    #[error("Event propagation stopped: {reason}")]
    PropagationStopped { reason: String },
}

impl EventError {
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn validation_with_hint(message: &str, hint: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn database(message: &str) -> Self {
        Self::Database {
            message: message.to_string(),
        }
    }

    pub fn observer(message: &str) -> Self {
        Self::Observer {
            message: message.to_string(),
        }
    }

    pub fn propagation_stopped(reason: &str) -> Self {
        Self::PropagationStopped {
            reason: reason.to_string(),
        }
    }

    pub fn is_propagation_stopped(&self) -> bool {
        matches!(self, Self::PropagationStopped { .. })
    }
}

impl From<ModelError> for EventError {
    fn from(err: ModelError) -> Self {
        Self::database(&err.to_string())
    }
}

impl From<EventError> for ModelError {
    fn from(err: EventError) -> Self {
        ModelError::Event(err.to_string())
    }
}
