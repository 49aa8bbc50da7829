//! The active chat session.
//!
//! A [`SessionContext`] is produced whenever a session id is selected and is replaced, never
//! mutated in place, when the user switches to another id.  Switching has no side effects:
//! transcripts are only written after a completed exchange.

use crate::error::Error;
use crate::observability::{SESSION_FRESH, SESSION_RESTORED, STORE_MASKED_LOAD_FAILURES};
use crate::registry::SessionRegistry;
use crate::store::{StorageKey, TranscriptStore, load_json};
use crate::types::{ChatSessionId, Message, ModelHistoryEntry, placeholder_title};

/// How a session context came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stored transcript was available; both sequences start empty.
    Fresh,
    /// Messages and model history were loaded from the store.
    Restored,
}

/// The currently selected session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: ChatSessionId,
    title: String,
    state: SessionState,
    pub(crate) messages: Vec<Message>,
    pub(crate) model_history: Vec<ModelHistoryEntry>,
    masked_load_failure: Option<Error>,
}

impl SessionContext {
    /// Creates an empty context for a newly generated id.
    pub fn fresh(id: ChatSessionId) -> Self {
        let title = placeholder_title(&id);
        Self {
            id,
            title,
            state: SessionState::Fresh,
            messages: Vec::new(),
            model_history: Vec::new(),
            masked_load_failure: None,
        }
    }

    /// Creates a context for a brand new session.
    pub fn new_session() -> Self {
        Self::fresh(ChatSessionId::generate())
    }

    /// Selects `id`, restoring its transcript when one is stored.
    ///
    /// If either the messages or the model history cannot be loaded, for whatever reason,
    /// the context starts empty instead of failing.  A failure other than "not found" is kept
    /// and available through [`SessionContext::masked_load_failure`].
    pub fn select(
        store: &dyn TranscriptStore,
        registry: &SessionRegistry,
        id: ChatSessionId,
    ) -> Self {
        let title = registry
            .title(&id)
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_title(&id));
        let loaded = load_json::<Vec<Message>>(store, &StorageKey::Messages(id.clone())).and_then(
            |messages| {
                load_json::<Vec<ModelHistoryEntry>>(store, &StorageKey::History(id.clone()))
                    .map(|history| (messages, history))
            },
        );
        match loaded {
            Ok((messages, model_history)) => {
                SESSION_RESTORED.click();
                Self {
                    id,
                    title,
                    state: SessionState::Restored,
                    messages,
                    model_history,
                    masked_load_failure: None,
                }
            }
            Err(err) => {
                SESSION_FRESH.click();
                let masked_load_failure = if err.is_not_found() {
                    None
                } else {
                    STORE_MASKED_LOAD_FAILURES.click();
                    Some(err)
                };
                Self {
                    id,
                    title,
                    state: SessionState::Fresh,
                    messages: Vec::new(),
                    model_history: Vec::new(),
                    masked_load_failure,
                }
            }
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> &ChatSessionId {
        &self.id
    }

    /// Returns the session title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns whether the transcript was restored from the store.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the displayed messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the completion backend's history.
    pub fn model_history(&self) -> &[ModelHistoryEntry] {
        &self.model_history
    }

    /// Returns the load error that was swallowed when falling back to an empty transcript.
    pub fn masked_load_failure(&self) -> Option<&Error> {
        self.masked_load_failure.as_ref()
    }
}
