use std::fmt;

/// Where a configuration value was last set from, recorded per dotted key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `EMPORIUM__...` override; holds the variable name
    EnvVar(String),
    /// YAML or JSON file; holds the path
    File(String),
    /// [`ConfigurationManager::set`](crate::ConfigurationManager::set)
    Programmatic,
}

impl ConfigSource {
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ConfigSource::File(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "environment variable {}", var),
            ConfigSource::File(path) => write!(f, "file {}", path),
            ConfigSource::Programmatic => f.write_str("set in code"),
        }
    }
}
