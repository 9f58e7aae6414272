//! Errors raised while loading and checking operator settings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Sources merged but did not match the settings structure
    #[error("Failed to deserialize configuration: {0}")]
    Deserialize(String),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: String, message: String },

    #[error(
        "Unknown environment '{0}', expected one of: development, test, staging, production"
    )]
    UnknownEnvironment(String),

    #[error(
        "OPERATOR_CONFIG_DIR and OPERATOR_CONFIG_FILE cannot both be set; use the directory \
         for layered configuration or the file for a single configuration file"
    )]
    ConflictingSources,

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
