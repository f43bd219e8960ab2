//! Protocol module for conversation messages and envelopes
//!
//! This module defines the data model exchanged between callers and the
//! protocol engine:
//! - Messages with a closed role/type model
//! - Request/response envelopes
//! - In-band error kinds and descriptors

pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::{Request, Response, WireRequest};
pub use error::{ErrorDescriptor, ErrorKind, ProtocolError, ProtocolResult, ValidationIssue};
pub use types::{
    Arguments, Message, MessageBody, MessageBuilder, MessageContent, MessageRole, MessageType,
    WireMessage, DELIVERED, IN_REPLY_TO,
};
