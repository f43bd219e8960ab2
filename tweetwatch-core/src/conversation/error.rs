//! Conversation store error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store persistence
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while saving or restoring conversations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize conversations: {0}")]
    Serialization(#[from] serde_json::Error),
}
