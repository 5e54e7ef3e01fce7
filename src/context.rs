//! Per-sender conversation history. Each sender gets a bounded, FIFO-evicting
//! sequence of turns; the store hands out one lockable entry per sender so a
//! sender's append/complete/append sequence is serialized without blocking
//! anyone else.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message unit in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Turn {
            role,
            content: content.into(),
        }
    }
}

/// Bounded turn history for one sender. Holds at most `capacity` turns; a push
/// at capacity evicts the oldest turn first, including the seeded system turn
/// once it has aged out.
#[derive(Debug)]
pub struct ConversationContext {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        ConversationContext {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        if self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn::new(role, content));
    }

    /// Independent copy of the current turns, in append order. Callers build
    /// completion requests from this and never observe later mutation.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Sender-id → context map. Constructed once at bootstrap and carried in the
/// shared application state; the outer lock covers only entry lookup/insert,
/// while each entry's own mutex serializes that sender's message handling.
pub struct ConversationStore {
    capacity: usize,
    contexts: StdMutex<HashMap<u64, Arc<Mutex<ConversationContext>>>>,
}

impl ConversationStore {
    pub fn new(capacity: usize) -> Self {
        ConversationStore {
            capacity,
            contexts: StdMutex::new(HashMap::new()),
        }
    }

    /// Return the sender's context, creating and seeding it with one system
    /// turn on first contact. Contexts live for the process lifetime.
    pub fn get_or_create(
        &self,
        sender_id: u64,
        seed_prompt: &str,
    ) -> Arc<Mutex<ConversationContext>> {
        let mut contexts = self.contexts.lock().expect("conversation store lock poisoned");
        contexts
            .entry(sender_id)
            .or_insert_with(|| {
                let mut context = ConversationContext::new(self.capacity);
                context.push(Role::System, seed_prompt);
                Arc::new(Mutex::new(context))
            })
            .clone()
    }

    /// Number of senders with a live context.
    pub fn sender_count(&self) -> usize {
        self.contexts
            .lock()
            .expect("conversation store lock poisoned")
            .len()
    }
}
