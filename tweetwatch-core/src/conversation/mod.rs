//! Conversation state management
//!
//! The [`ConversationStore`] is the single owner of every conversation's
//! history and context. Collaborators reach a conversation's context only
//! through a [`ContextHandle`].

mod context;
mod error;
mod state;
mod store;

pub use context::ContextHandle;
pub use error::{StoreError, StoreResult};
pub use state::{ConversationState, ConversationSummary};
pub use store::ConversationStore;
