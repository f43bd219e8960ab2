//! Protocol error types and their in-band representation

use crate::registry::ParamType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Machine-readable error kind carried by error messages and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Role not accepted from this sender
    InvalidRole,
    /// Message type not accepted from this sender, or malformed body
    InvalidMessageType,
    /// Function call names a function that is not registered
    UnknownFunction,
    /// Missing, unknown or mistyped function argument
    ValidationError,
    /// Upstream quota exhausted for the current window
    RateLimitExceeded,
    /// The tool adapter failed
    AdapterExecutionError,
    /// Strict mode and the conversation was never opened
    ConversationNotFound,
    /// The caller stopped waiting before the adapter finished
    Timeout,
    /// The caller cancelled its wait
    Cancelled,
    /// Envelope could not be decoded at all
    MalformedRequest,
}

impl ErrorKind {
    /// Stable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRole => "InvalidRole",
            Self::InvalidMessageType => "InvalidMessageType",
            Self::UnknownFunction => "UnknownFunction",
            Self::ValidationError => "ValidationError",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::AdapterExecutionError => "AdapterExecutionError",
            Self::ConversationNotFound => "ConversationNotFound",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::MalformedRequest => "MalformedRequest",
        }
    }

    /// Whether re-issuing the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded => true,
            Self::Timeout => true,
            Self::AdapterExecutionError => true,
            Self::InvalidRole
            | Self::InvalidMessageType
            | Self::UnknownFunction
            | Self::ValidationError
            | Self::ConversationNotFound
            | Self::Cancelled
            | Self::MalformedRequest => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What exactly is wrong with a function argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required parameter was not supplied
    MissingParameter,
    /// The parameter is not declared in the function's schema
    UnknownParameter,
    /// The supplied value does not match the declared type
    TypeMismatch {
        expected: ParamType,
        actual: &'static str,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter => write!(f, "missing required parameter"),
            Self::UnknownParameter => write!(f, "unknown parameter"),
            Self::TypeMismatch { expected, actual } => {
                write!(f, "expected {}, got {}", expected, actual)
            }
        }
    }
}

/// Errors produced while validating or executing a request
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("role '{role}' is not accepted from external callers")]
    InvalidRole { role: String },

    #[error("message type '{message_type}' is not accepted: {reason}")]
    InvalidMessageType {
        message_type: String,
        reason: String,
    },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("invalid arguments for '{function}': parameter '{parameter}': {issue}")]
    Validation {
        function: String,
        parameter: String,
        issue: ValidationIssue,
    },

    #[error("rate limit exceeded, next reset at {next_reset}")]
    RateLimitExceeded { next_reset: DateTime<Utc> },

    #[error("function '{function}' failed: {message}")]
    AdapterExecution {
        function: String,
        message: String,
        retryable: bool,
    },

    #[error("conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("no result within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("request cancelled by caller")]
    Cancelled,

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },
}

impl ProtocolError {
    /// Machine-readable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRole { .. } => ErrorKind::InvalidRole,
            Self::InvalidMessageType { .. } => ErrorKind::InvalidMessageType,
            Self::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::AdapterExecution { .. } => ErrorKind::AdapterExecutionError,
            Self::ConversationNotFound { .. } => ErrorKind::ConversationNotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::MalformedRequest { .. } => ErrorKind::MalformedRequest,
        }
    }

    /// Whether re-issuing the request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AdapterExecution { retryable, .. } => *retryable,
            other => other.kind().is_retryable(),
        }
    }

    /// Render the error as an in-band descriptor
    pub fn to_descriptor(&self) -> ErrorDescriptor {
        let mut descriptor = ErrorDescriptor::new(self.kind(), self.to_string());
        descriptor.retryable = self.is_retryable();
        match self {
            Self::Validation { parameter, .. } => {
                descriptor.parameter = Some(parameter.clone());
            }
            Self::RateLimitExceeded { next_reset } => {
                descriptor.next_reset = Some(*next_reset);
            }
            _ => {}
        }
        descriptor
    }
}

/// In-band error description returned to callers and kept in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Machine-readable kind
    pub kind: ErrorKind,

    /// Human-readable description
    pub message: String,

    /// Offending parameter for validation errors
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameter: Option<String>,

    /// When the rate-limit window resets
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_reset: Option<DateTime<Utc>>,

    /// Whether the caller may retry later
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorDescriptor {
    /// Create a descriptor with the kind's default retryability
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            parameter: None,
            next_reset: None,
            retryable: kind.is_retryable(),
        }
    }
}

impl From<&ProtocolError> for ErrorDescriptor {
    fn from(err: &ProtocolError) -> Self {
        err.to_descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_descriptor_names_parameter() {
        let err = ProtocolError::Validation {
            function: "collect_tweets".to_string(),
            parameter: "max_results".to_string(),
            issue: ValidationIssue::TypeMismatch {
                expected: ParamType::Integer,
                actual: "string",
            },
        };
        let descriptor = err.to_descriptor();
        assert_eq!(descriptor.kind, ErrorKind::ValidationError);
        assert_eq!(descriptor.parameter.as_deref(), Some("max_results"));
        assert!(descriptor.message.contains("expected integer, got string"));
        assert!(!descriptor.retryable);
    }

    #[test]
    fn test_rate_limit_descriptor_carries_reset() {
        let reset = Utc::now();
        let descriptor = ProtocolError::RateLimitExceeded { next_reset: reset }.to_descriptor();
        assert_eq!(descriptor.kind, ErrorKind::RateLimitExceeded);
        assert_eq!(descriptor.next_reset, Some(reset));
        assert!(descriptor.retryable);
    }

    #[test]
    fn test_adapter_error_retryability_follows_flag() {
        let err = ProtocolError::AdapterExecution {
            function: "update_config".to_string(),
            message: "bad value".to_string(),
            retryable: false,
        };
        assert!(!err.is_retryable());
        assert!(!err.to_descriptor().retryable);
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"RateLimitExceeded\"");
    }
}
