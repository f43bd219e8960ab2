//! Protocol engine
//!
//! The engine validates inbound messages, resolves function calls against
//! the registry, consults the rate limiter, runs adapters as background
//! tasks and records every exchange in the conversation store.

mod adapter;
pub mod builtins;
pub mod catalog;
mod config;
#[allow(clippy::module_inception)]
mod engine;
mod reply;

pub use adapter::{AdapterError, FnAdapter, Invocation, ToolAdapter};
pub use config::EngineConfig;
pub use engine::{EngineBuilder, ProtocolEngine};
pub use reply::{AcknowledgePolicy, ReplyPolicy};
