//! Chat modes: how a user message is turned into a response.

use serde::{Deserialize, Serialize};

/// The closed set of chat modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatModeId {
    /// Plain streamed completion
    #[default]
    Direct,
    /// Completion grounded on web search results
    GoogleSearch,
    /// Tool-using agent that only sees the current message
    Agent,
    /// Tool-using agent that sees the whole transcript
    ConversationalAgent,
}

/// Key required by the Google search mode.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
/// Custom search engine id required by the Google search mode.
pub const GOOGLE_CSE_ID: &str = "GOOGLE_CSE_ID";

impl ChatModeId {
    pub const ALL: [ChatModeId; 4] = [
        ChatModeId::Direct,
        ChatModeId::Agent,
        ChatModeId::ConversationalAgent,
        ChatModeId::GoogleSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModeId::Direct => "direct",
            ChatModeId::GoogleSearch => "google-search",
            ChatModeId::Agent => "agent",
            ChatModeId::ConversationalAgent => "conversational-agent",
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            ChatModeId::Direct => "Chat",
            ChatModeId::GoogleSearch => "Google Search",
            ChatModeId::Agent => "Agent",
            ChatModeId::ConversationalAgent => "Conversational Agent",
        }
    }

    /// Credentials the mode cannot run without.
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            ChatModeId::GoogleSearch => &[GOOGLE_API_KEY, GOOGLE_CSE_ID],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ChatModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential the user supplied for a specific mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModeKey {
    pub chat_mode_id: ChatModeId,
    pub key: String,
    pub value: String,
}

/// Find the value of `key` for `mode`; blank values count as missing.
pub fn find_mode_key<'a>(keys: &'a [ChatModeKey], mode: ChatModeId, key: &str) -> Option<&'a str> {
    keys.iter()
        .find(|k| k.chat_mode_id == mode && k.key == key)
        .map(|k| k.value.as_str())
        .filter(|v| !v.trim().is_empty())
}
