//! Chat message model and in-memory history

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One chat message, locally authored or received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message body
    pub text: String,

    /// Identity of the authoring peer
    pub sender_id: String,

    /// True when the local peer authored this message
    pub is_mine: bool,
}

/// Append-only message history for one chat session
///
/// Insertion order is display order. Snapshots are cloned; internal storage
/// is never aliased.
#[derive(Default)]
pub struct MessageStore {
    messages: Mutex<Vec<Message>>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&self, message: Message) {
        self.lock().push(message);
    }

    /// Snapshot of all messages in insertion order
    pub fn all(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no messages are stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove all messages
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
