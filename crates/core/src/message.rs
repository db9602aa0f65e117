//! Message and Conversation domain types.
//!
//! These are the value objects that flow through one exchange:
//! the caller submits a conversation with a new user message, a chat-mode
//! runner produces an assistant reply, and the updated copy is handed back.
//! The engine never keeps a conversation between exchanges.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ModelSpec;

/// Maximum characters kept when naming a conversation after its first message.
const CONVERSATION_NAME_LEN: usize = 30;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A conversation: ordered messages plus the settings they are sent with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,

    /// Display name
    pub name: String,

    /// Ordered messages, append-only except for the trailing assistant
    /// message while it streams
    pub messages: Vec<Message>,

    pub model: ModelSpec,

    /// System prompt
    pub prompt: String,

    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new(model: ModelSpec, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            id: ConversationId::new(),
            name: "New Conversation".into(),
            messages: Vec::new(),
            model,
            prompt: prompt.into(),
            temperature,
            folder_id: None,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Return a copy with `message` appended.
    pub fn with_message(&self, message: Message) -> Self {
        let mut updated = self.clone();
        updated.push(message);
        updated
    }

    /// Prepare the conversation for sending `message`.
    ///
    /// `delete_count` trailing messages are dropped first, which is how an
    /// edited or regenerated turn replaces the tail of the history.
    pub fn with_user_message(&self, message: Message, delete_count: usize) -> Self {
        let mut updated = self.clone();
        let keep = updated.messages.len().saturating_sub(delete_count);
        updated.messages.truncate(keep);
        updated.push(message);
        updated
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Replace the content of the last message in place.
    ///
    /// Returns `false` when the conversation is empty.
    pub fn set_last_content(&mut self, content: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.content = content.into();
                true
            }
            None => false,
        }
    }
}

/// Derive a conversation name from the first message of a conversation.
pub fn conversation_name_from_message(content: &str) -> String {
    let trimmed = content.trim();
    let mut name: String = trimmed.chars().take(CONVERSATION_NAME_LEN).collect();
    if trimmed.chars().count() > CONVERSATION_NAME_LEN {
        name = name.trim_end().to_string();
        name.push_str("...");
    }
    name
}
