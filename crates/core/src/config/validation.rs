use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required key: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid value for key '{key}': '{value}'. Expected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Unsupported configuration file '{path}': expected a .yaml, .yml or .json file")]
    UnsupportedFormat { path: String },

    #[error("Environment variable error: {message}")]
    EnvironmentError { message: String },

    #[error("Could not deserialize '{key}': {message}")]
    Deserialize { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Create a missing required key error
    pub fn missing_required(key: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create an environment error
    pub fn environment_error(message: impl Into<String>) -> Self {
        Self::EnvironmentError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_key() {
        let err = ConfigError::missing_required("database.default", "Set database.default in config/database.yaml");
        assert!(err.to_string().contains("database.default"));

        let err = ConfigError::invalid_value("database.connections.main.port", "abc", "an integer port");
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("an integer port"));
    }
}
