//! Tool adapter abstraction
//!
//! Adapters are the external implementations behind registered functions.
//! The engine only knows their signature: an [`Invocation`] in, a JSON value
//! or an [`AdapterError`] out.

use crate::conversation::ContextHandle;
use crate::protocol::Arguments;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure reported by a tool adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
    /// Whether the same call may succeed later
    pub retryable: bool,
}

impl AdapterError {
    /// A transient failure, such as an upstream API error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will repeat on retry
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Everything an adapter receives for one call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub conversation_id: String,
    pub function: String,
    /// Arguments already validated against the function's schema
    pub arguments: Arguments,
    /// Context of the calling conversation
    pub context: ContextHandle,
    /// Cancelled when the engine shuts down
    pub cancel: CancellationToken,
}

impl Invocation {
    /// Look up an argument, treating `null` as absent
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name).filter(|value| !value.is_null())
    }

    /// Look up a string argument
    pub fn str_argument(&self, name: &str) -> Option<&str> {
        self.argument(name).and_then(Value::as_str)
    }
}

/// Implementation behind a registered function
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Execute the call
    async fn invoke(&self, invocation: Invocation) -> Result<Value, AdapterError>;
}

/// Adapter backed by an async closure
pub struct FnAdapter<F> {
    f: F,
}

impl<F> FnAdapter<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolAdapter for FnAdapter<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, AdapterError>> + Send,
{
    async fn invoke(&self, invocation: Invocation) -> Result<Value, AdapterError> {
        (self.f)(invocation).await
    }
}
