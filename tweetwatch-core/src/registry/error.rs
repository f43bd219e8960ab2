//! Registry error types

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while registering functions
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Descriptor is structurally invalid
    #[error("invalid schema for function '{function}': {reason}")]
    InvalidSchema { function: String, reason: String },

    /// Function is not registered
    #[error("function not found: {name}")]
    NotFound { name: String },
}
