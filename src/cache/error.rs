//! Cache error types.

use thiserror::Error;

/// Errors of the persisted cache image.
///
/// None of these ever reach a tracker caller: the cache logs them and keeps
/// serving from memory.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache image at {path}: {message}")]
    Open { path: String, message: String },

    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
