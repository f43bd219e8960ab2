//! Tweetwatch core library
//!
//! Conversation and function-calling protocol core of the tweetwatch
//! incident monitor. Every external action (collecting posts, generating a
//! report, changing configuration) is a validated exchange between a caller
//! and the [`ProtocolEngine`], recorded in a per-conversation history and
//! bounded by the upstream API's rate limits.

pub mod clock;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod logging;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod retry;

pub use engine::{EngineBuilder, EngineConfig, ProtocolEngine};
pub use protocol::{ErrorKind, Message, Request, Response};

/// Returns the version of the tweetwatch core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
