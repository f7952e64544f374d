//! Request / response envelopes and the stored history entry.
//!
//! A [`Request`] is built once per inbound message by a comms channel and is
//! never mutated after that.  Stages that want to attach history produce an
//! enriched copy with [`Request::with_context`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Role ─────────────────────────────────────────────────────────────────────

/// Who authored a stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Lenient parse; anything that is not a user or assistant turn is
    /// treated as system-originated.
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::System,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── StoredMessage ────────────────────────────────────────────────────────────

/// One recorded turn in a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

// ── Request ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Request {
    /// Log correlation id, time-ordered.
    pub request_id: Uuid,
    pub user_id: String,
    pub chat_id: i64,
    pub text: String,
    /// Recent history attached by an upstream stage, oldest first.
    pub context: Vec<StoredMessage>,
}

impl Request {
    pub fn new(user_id: impl Into<String>, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            user_id: user_id.into(),
            chat_id,
            text: text.into(),
            context: Vec::new(),
        }
    }

    /// Copy of this request carrying `context`.  The original is untouched.
    pub fn with_context(&self, context: Vec<StoredMessage>) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// Reply handed back to the transport.
///
/// Exactly one of `text` or `payload` is meaningful: when `payload` is set
/// the transport delivers it as a file attachment and ignores `text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub chat_id: i64,
    pub text: String,
    pub payload: Option<Vec<u8>>,
    pub context: Vec<StoredMessage>,
}

impl Response {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn attachment(chat_id: i64, bytes: Vec<u8>) -> Self {
        Self {
            chat_id,
            payload: Some(bytes),
            ..Self::default()
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.payload.is_some()
    }
}
