//! Session-scoped conversation log.
//!
//! A conversation is `Empty` until the first answer arrives. That answer is the
//! base resolution and stays as the first turn until `reset`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationState {
    Empty,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConversationState {
        if self.turns.is_empty() {
            ConversationState::Empty
        } else {
            ConversationState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConversationState::Active
    }

    /// The first assistant answer, or `None` while empty
    pub fn base_resolution(&self) -> Option<&str> {
        self.turns.first().map(|turn| turn.text.as_str())
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns after the base resolution
    pub fn follow_ups(&self) -> &[Turn] {
        self.turns.get(1..).unwrap_or(&[])
    }

    /// Installs the base resolution. Only called on an empty conversation.
    pub(crate) fn begin(&mut self, base_resolution: String) {
        debug_assert!(self.turns.is_empty());
        self.turns.push(Turn::assistant(base_resolution));
    }

    /// Appends a question and its answer as one step
    pub(crate) fn push_exchange(&mut self, question: String, answer: String) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
    }

    /// Drops every turn, including the base resolution
    pub fn reset(&mut self) {
        self.turns.clear();
    }
}
