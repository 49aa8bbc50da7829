//! The set of known chat sessions and their titles.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::observability::REGISTRY_REGISTRATIONS;
use crate::store::{StorageKey, TranscriptStore, load_json, save_json};
use crate::types::{ChatSessionId, SessionRecord};

/// Persisted mapping from session id to its record.
pub type RegistryState = BTreeMap<ChatSessionId, SessionRecord>;

/// Tracks which sessions exist, backed by a [`TranscriptStore`].
///
/// Sessions are only registered once they receive their first message, so an abandoned
/// session never shows up in [`SessionRegistry::sessions`].
pub struct SessionRegistry {
    store: Arc<dyn TranscriptStore>,
    state: RegistryState,
}

impl SessionRegistry {
    /// Loads the registry from `store`.
    ///
    /// # Errors
    ///
    /// A store with no registry yields an empty registry; any other load failure is returned.
    pub fn load(store: Arc<dyn TranscriptStore>) -> Result<Self> {
        let state = Self::load_all(store.as_ref())?;
        Ok(Self { store, state })
    }

    /// Reads the persisted registry, treating a missing record as "no sessions yet".
    pub fn load_all(store: &dyn TranscriptStore) -> Result<RegistryState> {
        match load_json(store, &StorageKey::Registry) {
            Ok(state) => Ok(state),
            Err(err) if err.is_not_found() => Ok(RegistryState::new()),
            Err(err) => Err(err),
        }
    }

    /// Registers `id` with `title` unless it is already known.
    ///
    /// The whole mapping is written through to the store immediately.  Returns `true` when a
    /// new entry was inserted.
    pub fn register_if_absent(&mut self, id: &ChatSessionId, title: &str) -> Result<bool> {
        if self.state.contains_key(id) {
            return Ok(false);
        }
        let mut next = self.state.clone();
        next.insert(id.clone(), SessionRecord::new(title));
        save_json(self.store.as_ref(), &StorageKey::Registry, &next)?;
        self.state = next;
        REGISTRY_REGISTRATIONS.click();
        Ok(true)
    }

    /// Returns the record for `id`, if registered.
    pub fn get(&self, id: &ChatSessionId) -> Option<&SessionRecord> {
        self.state.get(id)
    }

    /// Returns the title for `id`, if registered.
    pub fn title(&self, id: &ChatSessionId) -> Option<&str> {
        self.state.get(id).map(|record| record.title.as_str())
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: &ChatSessionId) -> bool {
        self.state.contains_key(id)
    }

    /// Returns the number of registered sessions.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Returns true if no session has been registered.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Returns the underlying mapping.
    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Returns all sessions, newest first.
    pub fn sessions(&self) -> Vec<(&ChatSessionId, &SessionRecord)> {
        let mut sessions: Vec<_> = self.state.iter().collect();
        sessions.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(a.0)));
        sessions
    }
}
