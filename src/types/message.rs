use serde::{Deserialize, Serialize};

/// Avatar shown next to assistant messages.
pub const AI_AVATAR: &str = "🤖";

/// Role of a displayed chat message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    #[serde(alias = "ai")]
    Assistant,
}

impl MessageRole {
    /// Label used when rendering the role.
    pub fn label(self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant => "Talkie",
        }
    }
}

/// A message as shown to the user.
///
/// Messages are appended in chronological order and never edited afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The role of the message.
    pub role: MessageRole,

    /// The text of the message.
    pub content: String,

    /// Optional icon displayed next to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            avatar: None,
        }
    }

    /// Create a new assistant message carrying the given avatar.
    pub fn assistant(content: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            avatar: Some(avatar.into()),
        }
    }
}
