//! The narrow interface Talkie needs from a completion backend.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::ModelHistoryEntry;

/// A lazily produced sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Starts chats against a completion backend.
pub trait Completion: Send + Sync {
    /// Handle to one chat.
    type Chat: ChatHandle;

    /// Starts a chat that continues from `history`.
    fn start_session(&self, history: Vec<ModelHistoryEntry>) -> Self::Chat;
}

/// One chat with a completion backend.
#[async_trait::async_trait]
pub trait ChatHandle: Send {
    /// Sends `prompt` and returns the reply as a fragment stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued.  Failures after the first fragment
    /// arrive through the stream itself.
    async fn send(&mut self, prompt: &str) -> Result<FragmentStream>;

    /// The backend's canonical history, including the last exchange once its stream has been
    /// fully drained.
    fn history(&self) -> Vec<ModelHistoryEntry>;
}
