use crate::config::ConfigError;
use std::env;
use std::str::FromStr;

/// Environment variable consulted by [`Environment::detect`]
pub const ENVIRONMENT_VAR: &str = "EMPORIUM_ENV";

/// Deployment environment a configuration was loaded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "environment".to_string(),
                value: s.to_string(),
                expected: "development, testing, or production".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        })
    }
}

impl Environment {
    /// Read the environment from `EMPORIUM_ENV`, defaulting to development
    pub fn detect() -> Result<Self, ConfigError> {
        match env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(env::VarError::NotPresent) => Ok(Environment::Development),
            Err(e) => Err(ConfigError::environment_error(format!("{}: {}", ENVIRONMENT_VAR, e))),
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}
