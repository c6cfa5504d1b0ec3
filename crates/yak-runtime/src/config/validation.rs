//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, MessageConfig, YakConfig};
use crate::strategy::Strategy;

/// Validates the entire configuration.
pub fn validate_config(config: &YakConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_message_config(&config.messages)?;
    Ok(())
}

/// Validates logging configuration.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(
            "Logging filter module names cannot be empty",
        ));
    }

    Ok(())
}

/// Validates message handling configuration.
fn validate_message_config(messages: &MessageConfig) -> ConfigResult<()> {
    messages
        .strategy
        .parse::<Strategy>()
        .map(|_| ())
        .map_err(|_| ConfigError::UnknownStrategy(messages.strategy.clone()))
}
