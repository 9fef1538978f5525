//! # emporium-core
//!
//! Configuration and logging foundation shared by the emporium crates.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigSource, ConfigurationManager, Environment};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
