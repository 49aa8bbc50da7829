use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::ChatSessionId;

/// Registry entry for a session that has received at least one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Human-readable title shown in the session picker.
    pub title: String,

    /// When the session was registered.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl SessionRecord {
    /// Creates a record stamped with the current time.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Placeholder title for a session that has not been registered yet.
pub fn placeholder_title(id: &ChatSessionId) -> String {
    format!("ChatSession-{id}")
}
