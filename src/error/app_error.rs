use thiserror::Error;

use crate::config::error::ConfigError;

/// Application-wide error type that represents all possible errors in the system.
///
/// Remote-service failures are kept opaque: the tracker and chat clients wrap
/// whatever went wrong on the wire in [`AppError::Remote`] together with the
/// operation that was attempted, and nothing at this layer retries them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Unauthorized access error with authentication message
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Forbidden access error with authorization message
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The requested action conflicts with work already in progress
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// A call to the ticket tracker or the chat platform failed
    #[error("Remote operation failed: {operation}: {source}")]
    Remote {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error: {source}")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Wraps a failed remote call.
    pub fn remote(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Remote {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Returns true for errors caused by the remote side rather than by us.
    pub fn is_remote(&self) -> bool {
        matches!(self, AppError::Remote { .. })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match &error {
            ConfigError::Invalid { field, .. } => field.clone(),
            ConfigError::FileNotFound(_) => "config_file".to_string(),
            _ => "settings".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::from(error),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal {
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_keeps_operation() {
        let err = AppError::remote("GET /rest/bug/1", anyhow::anyhow!("connection reset"));
        assert!(err.is_remote());
        assert!(err.to_string().contains("GET /rest/bug/1"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_config_validation_error_maps_key() {
        let err: AppError = ConfigError::validation("chat.admin_channel", "must not be empty").into();
        match err {
            AppError::Configuration { key, .. } => assert_eq!(key, "chat.admin_channel"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
