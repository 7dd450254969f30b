//! Short-lived conversation memory: a bounded history of turns per caller identity.
//!
//! Held in a sharded `DashMap`; the shard lock covers one append + truncate (+ snapshot)
//! and is released before any generation call is awaited. Nothing is persisted.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum turns retained per identity. Oldest turns are evicted first.
pub const MAX_HISTORY_TURNS: usize = 8;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message exchanged with the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Per-identity bounded history. Different identities never contend on the same entry.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: DashMap<String, VecDeque<ConversationTurn>>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::with_max_turns(MAX_HISTORY_TURNS)
    }

    /// Memory retaining at most `max_turns` (at least 1) per identity.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: DashMap::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Appends a turn and evicts from the front past the bound.
    pub fn append(&self, identity: &str, turn: ConversationTurn) {
        let mut history = self.turns.entry(identity.to_string()).or_default();
        push_bounded(&mut history, turn, self.max_turns);
    }

    /// Appends a turn and returns the resulting history, atomically for this identity.
    pub fn append_and_snapshot(&self, identity: &str, turn: ConversationTurn) -> Vec<ConversationTurn> {
        let mut history = self.turns.entry(identity.to_string()).or_default();
        push_bounded(&mut history, turn, self.max_turns);
        history.iter().cloned().collect()
    }

    /// Read-only copy of the history for `identity`, oldest first. Empty if unknown.
    pub fn snapshot(&self, identity: &str) -> Vec<ConversationTurn> {
        self.turns
            .get(identity)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn turn_count(&self, identity: &str) -> usize {
        self.turns.get(identity).map(|h| h.len()).unwrap_or(0)
    }

    /// Number of identities with any recorded history.
    pub fn identity_count(&self) -> usize {
        self.turns.len()
    }

    pub fn clear(&self, identity: &str) {
        if self.turns.remove(identity).is_some() {
            tracing::debug!(target: "nyaya::memory", identity, "Conversation history cleared");
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(history: &mut VecDeque<ConversationTurn>, turn: ConversationTurn, max_turns: usize) {
    history.push_back(turn);
    while history.len() > max_turns {
        history.pop_front();
    }
}
