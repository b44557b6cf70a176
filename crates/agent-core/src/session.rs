//! Chat Sessions
//!
//! One `ChatSession` per agent-controlled player per game. The history is
//! append-only from the outside; only the transport may roll back the prompt
//! of an exchange that never got a reply.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered conversation owned by a single player.
///
/// Always starts with exactly one SYSTEM message so that providers which
/// resend the whole history and providers which keep state server-side see
/// the same canonical record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    id: SessionId,
    owner: String,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Create a session for `owner` seeded with its system prompt
    pub fn new(owner: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            owner: owner.into(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Name of the player owning this session
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Full history, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The leading system prompt
    pub fn system_prompt(&self) -> &str {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map_or("", |m| m.content.as_str())
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of completed prompt/reply exchanges
    pub fn exchanges(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render as `ROLE: text` blocks, the format used for chat-history dumps
    pub fn transcript(&self) -> String {
        let mut out = format!("=== Chat history for {} ({}) ===\n\n", self.owner, self.id);
        for message in &self.messages {
            out.push_str(&format!(
                "{}: {}\n\n",
                message.role.to_string().to_uppercase(),
                message.content
            ));
        }
        out
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove the trailing USER message of a failed exchange.
    pub(crate) fn rollback_prompt(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(m) if m.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }
}
