//! Database Backend Abstractions
//!
//! One physical connection per supported engine, each built on sqlx's native
//! driver. Drivers own value binding and the normalization of result cells
//! into [`Value`](crate::value::Value).

pub mod core;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use self::core::*;

use crate::error::ModelError;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseBackendType {
    pub fn dialect(&self) -> SqlDialect {
        match self {
            DatabaseBackendType::PostgreSQL => SqlDialect::PostgreSQL,
            DatabaseBackendType::MySQL => SqlDialect::MySQL,
            DatabaseBackendType::SQLite => SqlDialect::SQLite,
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseBackendType::PostgreSQL => Some(5432),
            DatabaseBackendType::MySQL => Some(3306),
            DatabaseBackendType::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Ok(DatabaseBackendType::PostgreSQL),
            "mysql" | "mariadb" => Ok(DatabaseBackendType::MySQL),
            "sqlite" | "sqlite3" => Ok(DatabaseBackendType::SQLite),
            _ => Err(ModelError::Configuration(format!(
                "Unsupported database driver '{}' (expected pgsql, mysql or sqlite)",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        assert_eq!("pgsql".parse::<DatabaseBackendType>().unwrap(), DatabaseBackendType::PostgreSQL);
        assert_eq!("MariaDB".parse::<DatabaseBackendType>().unwrap(), DatabaseBackendType::MySQL);
        assert_eq!("sqlite".parse::<DatabaseBackendType>().unwrap(), DatabaseBackendType::SQLite);
    }

    #[test]
    fn test_unknown_driver_is_configuration_error() {
        let err = "oracle".parse::<DatabaseBackendType>().unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }
}
