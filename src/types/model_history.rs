use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the completion backend's own record of a conversation.
///
/// The session layer persists and replays these entries without looking inside them; only the
/// backend that produced an entry knows its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelHistoryEntry(pub Value);

impl ModelHistoryEntry {
    /// Wraps a raw JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the entry, returning the raw JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ModelHistoryEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
