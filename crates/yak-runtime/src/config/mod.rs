//! Configuration module for the Yak runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging and message handling options.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, MessageConfig, SpanEventConfig, YakConfig,
};
pub use validation::validate_config;
