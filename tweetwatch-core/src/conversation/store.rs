//! Process-wide conversation store

use super::error::{StoreError, StoreResult};
use super::state::{ConversationState, ConversationSummary};
use crate::clock::{SharedClock, SystemClock};
use crate::protocol::Message;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

type Entry = Arc<Mutex<ConversationState>>;

/// On-disk layout written by [`ConversationStore::save_to_path`]
#[derive(Debug, Serialize, Deserialize)]
struct PersistedConversations {
    saved_at: DateTime<Utc>,
    conversations: Vec<ConversationState>,
}

/// Owns every conversation's state
///
/// Each conversation sits behind its own mutex, so mutations on one
/// identifier are serialized while distinct identifiers proceed in parallel.
/// The outer map lock is held (shared) for the duration of a mutation, which
/// keeps eviction from removing a conversation mid-append.
#[derive(Debug)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Entry>>,
    retention: Duration,
    clock: SharedClock,
}

impl ConversationStore {
    /// Create an empty store using the system clock
    pub fn new(retention: std::time::Duration) -> Self {
        Self::with_clock(retention, Arc::new(SystemClock))
    }

    /// Create an empty store driven by `clock`
    pub fn with_clock(retention: std::time::Duration, clock: SharedClock) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            retention: to_chrono(retention),
            clock,
        }
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `f` against a conversation, creating it first if allowed
    fn with_conversation<R>(
        &self,
        id: &str,
        create: bool,
        f: impl FnOnce(&mut ConversationState, DateTime<Utc>) -> R,
    ) -> Option<R> {
        {
            let map = self.conversations.read();
            if let Some(entry) = map.get(id) {
                let mut state = entry.lock();
                return Some(f(&mut *state, self.clock.now()));
            }
        }

        if !create {
            return None;
        }

        let mut map = self.conversations.write();
        let now = self.clock.now();
        let entry = Arc::clone(map.entry(id.to_string()).or_insert_with(|| {
            debug!(conversation_id = %id, "Created conversation");
            Arc::new(Mutex::new(ConversationState::new(id, now)))
        }));
        let mut state = entry.lock();
        Some(f(&mut *state, now))
    }

    fn read<R>(&self, id: &str, f: impl FnOnce(&ConversationState) -> R) -> Option<R> {
        let map = self.conversations.read();
        map.get(id).map(|entry| f(&*entry.lock()))
    }

    /// Open a conversation explicitly; returns `true` if it was new
    pub fn create(&self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        let mut map = self.conversations.write();
        if map.contains_key(id) {
            return false;
        }
        map.insert(
            id.to_string(),
            Arc::new(Mutex::new(ConversationState::new(id, self.clock.now()))),
        );
        debug!(conversation_id = %id, "Opened conversation");
        true
    }

    /// Snapshot of a conversation, creating it if absent
    pub fn get_or_create(&self, id: &str) -> ConversationState {
        self.read(id, ConversationState::clone)
            .or_else(|| self.with_conversation(id, true, |state, _| state.clone()))
            .unwrap_or_else(|| ConversationState::new(id, self.clock.now()))
    }

    /// Append one message; returns the new history length
    pub fn append(&self, id: &str, message: Message) -> usize {
        self.with_conversation(id, true, |state, now| {
            state.push(message, now);
            state.messages.len()
        })
        .unwrap_or_default()
    }

    /// Append an inbound message and its reply under one lock acquisition
    pub fn append_exchange(&self, id: &str, inbound: Message, reply: Message) -> usize {
        self.with_conversation(id, true, |state, now| {
            state.push(inbound, now);
            state.push(reply, now);
            state.messages.len()
        })
        .unwrap_or_default()
    }

    /// Like [`append_exchange`](Self::append_exchange), but only into an
    /// existing conversation
    pub fn try_append_exchange(&self, id: &str, inbound: Message, reply: Message) -> Option<usize> {
        self.with_conversation(id, false, |state, now| {
            state.push(inbound, now);
            state.push(reply, now);
            state.messages.len()
        })
    }

    /// Set a context key, creating the conversation if absent
    pub fn set_context(&self, id: &str, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.with_conversation(id, true, |state, now| state.set_context(key, value, now));
    }

    /// Read a context key
    pub fn get_context(&self, id: &str, key: &str) -> Option<Value> {
        self.read(id, |state| state.context.get(key).cloned()).flatten()
    }

    /// Whether a conversation exists
    pub fn contains(&self, id: &str) -> bool {
        self.conversations.read().contains_key(id)
    }

    /// Copy of a conversation's history
    pub fn transcript(&self, id: &str) -> Option<Vec<Message>> {
        self.read(id, |state| state.messages.clone())
    }

    /// Summary of a conversation
    pub fn summary(&self, id: &str) -> Option<ConversationSummary> {
        self.read(id, ConversationState::summary)
    }

    /// Number of live conversations
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    /// Whether the store holds no conversations
    pub fn is_empty(&self) -> bool {
        self.conversations.read().is_empty()
    }

    /// Remove conversations idle for longer than the retention period
    ///
    /// This is the only deletion path. Returns the number removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.conversations.write();
        let before = map.len();
        let retention = self.retention;
        map.retain(|_, entry| now - entry.lock().updated_at <= retention);
        let removed = before - map.len();

        if removed > 0 {
            info!(removed, remaining = map.len(), "Evicted expired conversations");
        }
        removed
    }

    /// Copy of every conversation, ordered by identifier
    pub fn snapshot(&self) -> Vec<ConversationState> {
        let map = self.conversations.read();
        let mut states: Vec<_> = map.values().map(|entry| entry.lock().clone()).collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    /// Write every conversation to `path` as pretty JSON
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> StoreResult<usize> {
        let path = path.as_ref();
        let persisted = PersistedConversations {
            saved_at: self.clock.now(),
            conversations: self.snapshot(),
        };
        let count = persisted.conversations.len();
        let json = serde_json::to_string_pretty(&persisted)?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), conversations = count, "Saved conversations");
        Ok(count)
    }

    /// Restore a store previously written by [`save_to_path`](Self::save_to_path)
    pub fn load_from_path(
        path: impl AsRef<Path>,
        retention: std::time::Duration,
        clock: SharedClock,
    ) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let persisted: PersistedConversations = serde_json::from_str(&content)?;

        let store = Self::with_clock(retention, clock);
        {
            let mut map = store.conversations.write();
            for state in persisted.conversations {
                map.insert(state.id.clone(), Arc::new(Mutex::new(state)));
            }
        }

        info!(
            path = %path.display(),
            conversations = store.len(),
            "Loaded conversations"
        );
        Ok(store)
    }
}

fn to_chrono(retention: std::time::Duration) -> Duration {
    Duration::from_std(retention).unwrap_or_else(|_| Duration::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use serde_json::json;

    fn store() -> (ConversationStore, ManualClock) {
        let clock = ManualClock::starting_now();
        let store = ConversationStore::with_clock(
            std::time::Duration::from_secs(60),
            Arc::new(clock.clone()),
        );
        (store, clock)
    }

    #[test]
    fn test_append_creates_conversation() {
        let (store, _) = store();
        assert!(!store.contains("c1"));
        assert_eq!(store.append("c1", Message::user("hello")), 1);
        assert!(store.contains("c1"));
    }

    #[test]
    fn test_exchange_appends_in_order() {
        let (store, _) = store();
        let inbound = Message::user("ping");
        let reply = Message::assistant("pong").replying_to(inbound.id);
        store.append_exchange("c1", inbound.clone(), reply.clone());

        let transcript = store.transcript("c1").unwrap();
        assert_eq!(transcript, vec![inbound, reply]);
    }

    #[test]
    fn test_eviction_uses_last_touch() {
        let (store, clock) = store();
        store.append("old", Message::user("a"));
        clock.advance(Duration::seconds(45));
        store.append("fresh", Message::user("b"));
        clock.advance(Duration::seconds(30));

        assert_eq!(store.evict_expired(clock.now()), 1);
        assert!(!store.contains("old"));
        assert!(store.contains("fresh"));
    }

    #[test]
    fn test_context_is_scoped() {
        let (store, _) = store();
        store.set_context("a", "last_collection_timestamp", json!("2024-01-01T00:00:00Z"));
        assert!(store.get_context("a", "last_collection_timestamp").is_some());
        assert!(store.get_context("b", "last_collection_timestamp").is_none());
    }

    #[test]
    fn test_create_is_idempotent() {
        let (store, _) = store();
        assert!(store.create("c1"));
        assert!(!store.create("c1"));
        assert_eq!(store.summary("c1").unwrap().message_count, 0);
    }
}
