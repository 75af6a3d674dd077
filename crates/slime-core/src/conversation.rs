//! # Conversation Log
//!
//! Append-only, ordered chat messages. Messages are never edited or
//! reordered once pushed. Timestamps are supplied by the caller (Unix epoch
//! milliseconds) so the log stays deterministic under test.

use serde::{Deserialize, Serialize};

/// Greeting every new slime opens with.
pub const GREETING: &str = "こんにちは！ボク、スライムAIだぷる(・ω・)ノ\nキミのこと、もっと知りたいぷる！お名前なんていうの？ぷるぷる。";

/// Appended as a model message when a turn fails.
pub const APOLOGY: &str = "ぷる...？ 通信に失敗しちゃったぷる。";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    /// Speaker label used in transcripts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "あなた",
            Role::Model => "スライム",
            Role::System => "システム",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
        }
    }
}

/// The ordered message sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// A fresh log holding only the greeting.
    #[must_use]
    pub fn with_greeting(timestamp: i64) -> Self {
        Self {
            messages: vec![Message::new(Role::Model, GREETING, timestamp)],
        }
    }

    /// Wrap an already ordered sequence.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages (fewer if the log is shorter).
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
