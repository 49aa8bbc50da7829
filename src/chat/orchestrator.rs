//! Runs chat exchanges against the active session.
//!
//! This module provides the `ChatOrchestrator`, which owns the transcript store, the session
//! registry and the completion backend, and drives one exchange at a time:
//!
//! 1. register the session if this is its first message
//! 2. append the user message
//! 3. stream the reply through a [`StreamAccumulator`] into the renderer
//! 4. append the assistant message and adopt the backend's history
//! 5. persist messages and history
//!
//! If the reply stream fails, steps 4 and 5 are skipped: the user message stays in memory and
//! is persisted with the next successful exchange of the same session.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;

use crate::accumulator::{Branding, StreamAccumulator};
use crate::completion::{ChatHandle, Completion};
use crate::error::{Error, Result};
use crate::exchange_logger::ExchangeLogger;
use crate::observability::{EXCHANGE_DURATION, EXCHANGE_ERRORS, EXCHANGES, STREAM_TTFB};
use crate::registry::SessionRegistry;
use crate::render::Renderer;
use crate::session::SessionContext;
use crate::store::{StorageKey, TranscriptStore, save_json};
use crate::types::{AI_AVATAR, ChatSessionId, Message, ModelHistoryEntry};

/// An entry of the session picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChoice {
    /// The session id.
    pub id: ChatSessionId,
    /// The title to display.
    pub title: String,
    /// Whether this is the active session.
    pub is_current: bool,
}

/// Ties the store, the registry and the completion backend together.
pub struct ChatOrchestrator<C: Completion> {
    store: Arc<dyn TranscriptStore>,
    registry: SessionRegistry,
    completion: C,
    branding: Branding,
    avatar: String,
    logger: Option<Arc<dyn ExchangeLogger>>,
}

impl<C: Completion> ChatOrchestrator<C> {
    /// Creates an orchestrator, loading the session registry from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored registry exists but cannot be read.
    pub fn new(store: Arc<dyn TranscriptStore>, completion: C) -> Result<Self> {
        let registry = SessionRegistry::load(Arc::clone(&store))?;
        Ok(Self {
            store,
            registry,
            completion,
            branding: Branding::default(),
            avatar: AI_AVATAR.to_string(),
            logger: None,
        })
    }

    /// Sets the replacements applied to finished replies.
    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = branding;
        self
    }

    /// Sets the avatar stored with assistant messages.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = avatar.into();
        self
    }

    /// Installs an exchange logger.
    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Returns the transcript store.
    pub fn store(&self) -> &dyn TranscriptStore {
        self.store.as_ref()
    }

    /// Starts a brand new, unregistered session.
    pub fn new_session(&self) -> SessionContext {
        SessionContext::new_session()
    }

    /// Selects `id`, restoring its transcript when possible.
    pub fn select(&self, id: ChatSessionId) -> SessionContext {
        let context = SessionContext::select(self.store.as_ref(), &self.registry, id);
        if let (Some(logger), Some(err)) = (&self.logger, context.masked_load_failure()) {
            logger.log_masked_load_failure(context.id(), err);
        }
        context
    }

    /// Lists the sessions a user can pick from: the active one first, then every registered
    /// session, newest first.
    pub fn session_choices(&self, active: &SessionContext) -> Vec<SessionChoice> {
        let mut choices = vec![SessionChoice {
            id: active.id().clone(),
            title: active.title().to_string(),
            is_current: true,
        }];
        choices.extend(
            self.registry
                .sessions()
                .into_iter()
                .filter(|(id, _)| *id != active.id())
                .map(|(id, record)| SessionChoice {
                    id: id.clone(),
                    title: record.title.clone(),
                    is_current: false,
                }),
        );
        choices
    }

    /// Runs one exchange: sends `prompt` in `context` and streams the reply to `renderer`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty prompt, a storage error if the registry or the
    /// transcript cannot be written, and the backend's error if the reply cannot be obtained.
    /// In the latter case the user message remains in `context` but nothing is persisted.
    pub async fn run_exchange(
        &mut self,
        context: &mut SessionContext,
        prompt: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        if prompt.trim().is_empty() {
            return Err(Error::invalid_prompt());
        }
        EXCHANGES.click();
        let started = Instant::now();

        self.registry
            .register_if_absent(context.id(), context.title())?;
        context.messages.push(Message::user(prompt));
        if let Some(logger) = &self.logger {
            logger.log_exchange_start(context.id(), prompt);
        }

        let (final_text, history) = match self.stream_reply(context, prompt, renderer).await {
            Ok(reply) => reply,
            Err((err, partial)) => {
                EXCHANGE_ERRORS.click();
                if let Some(logger) = &self.logger {
                    logger.log_exchange_failed(context.id(), &err, &partial);
                }
                return Err(err);
            }
        };

        let reply = Message::assistant(final_text, self.avatar.clone());
        context.messages.push(reply.clone());
        context.model_history = history;
        self.persist(context)?;

        EXCHANGE_DURATION.add(started.elapsed().as_secs_f64());
        if let Some(logger) = &self.logger {
            logger.log_exchange_complete(context.id(), &reply);
        }
        Ok(())
    }

    /// Streams the reply, returning the final text and the backend's history, or the error
    /// together with the partial text that was shown.
    async fn stream_reply(
        &self,
        context: &SessionContext,
        prompt: &str,
        renderer: &mut dyn Renderer,
    ) -> std::result::Result<(String, Vec<ModelHistoryEntry>), (Error, String)> {
        let mut chat = self.completion.start_session(context.model_history.clone());
        let fragments = chat.send(prompt).await.map_err(|err| (err, String::new()))?;
        let sent = Instant::now();

        let (mut live, final_rx) = StreamAccumulator::new(fragments, self.branding.clone());
        renderer.start_response(&self.avatar);
        let mut failure = None;
        let mut first = true;
        while let Some(view) = live.next().await {
            match view {
                Ok(view) => {
                    if first {
                        STREAM_TTFB.add(sent.elapsed().as_secs_f64());
                        first = false;
                    }
                    if let Some(logger) = &self.logger {
                        logger.log_live_view(context.id(), &view);
                    }
                    renderer.print_live(&view);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let final_text = final_rx.await.map_err(|_| {
            (
                Error::streaming("reply stream dropped before completion", None),
                live.running_text().trim().to_string(),
            )
        })?;
        renderer.finish_live(&final_text);

        if let Some(err) = failure {
            let err = if err.is_streaming() {
                err
            } else {
                Error::streaming(format!("reply stream failed: {err}"), Some(Box::new(err)))
            };
            return Err((err, final_text));
        }
        Ok((final_text, chat.history()))
    }

    /// Writes the model history before the messages, so a failed write never leaves a stored
    /// message list that is ahead of the stored history.
    fn persist(&self, context: &SessionContext) -> Result<()> {
        save_json(
            self.store.as_ref(),
            &StorageKey::History(context.id().clone()),
            context.model_history(),
        )?;
        save_json(
            self.store.as_ref(),
            &StorageKey::Messages(context.id().clone()),
            context.messages(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use futures::stream;
    use serde_json::json;

    use crate::completion::FragmentStream;
    use crate::session::SessionState;
    use crate::store::{MemoryTranscriptStore, TranscriptStore, load_json};

    struct Scripted {
        fragments: Vec<Result<String>>,
        history: Vec<ModelHistoryEntry>,
        seen: Arc<Mutex<Vec<(String, Vec<ModelHistoryEntry>)>>>,
    }

    struct ScriptedChat {
        fragments: Vec<Result<String>>,
        start: Vec<ModelHistoryEntry>,
        history: Vec<ModelHistoryEntry>,
        seen: Arc<Mutex<Vec<(String, Vec<ModelHistoryEntry>)>>>,
    }

    impl Completion for Scripted {
        type Chat = ScriptedChat;

        fn start_session(&self, history: Vec<ModelHistoryEntry>) -> ScriptedChat {
            ScriptedChat {
                fragments: self.fragments.clone(),
                start: history,
                history: self.history.clone(),
                seen: Arc::clone(&self.seen),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatHandle for ScriptedChat {
        async fn send(&mut self, prompt: &str) -> Result<FragmentStream> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), self.start.clone()));
            Ok(Box::pin(stream::iter(std::mem::take(&mut self.fragments))))
        }

        fn history(&self) -> Vec<ModelHistoryEntry> {
            self.history.clone()
        }
    }

    /// A backend whose requests never get through.
    struct Unreachable;

    struct UnreachableChat;

    impl Completion for Unreachable {
        type Chat = UnreachableChat;

        fn start_session(&self, _: Vec<ModelHistoryEntry>) -> UnreachableChat {
            UnreachableChat
        }
    }

    #[async_trait::async_trait]
    impl ChatHandle for UnreachableChat {
        async fn send(&mut self, _: &str) -> Result<FragmentStream> {
            Err(Error::connection("Connection error: refused", None))
        }

        fn history(&self) -> Vec<ModelHistoryEntry> {
            Vec::new()
        }
    }

    /// Accepts every write except model histories.
    #[derive(Default)]
    struct HistoryWritesFail {
        inner: MemoryTranscriptStore,
    }

    impl TranscriptStore for HistoryWritesFail {
        fn load(&self, key: &StorageKey) -> Result<Vec<u8>> {
            self.inner.load(key)
        }

        fn save(&self, key: &StorageKey, value: &[u8]) -> Result<()> {
            if matches!(key, StorageKey::History(_)) {
                return Err(Error::io(
                    "disk full",
                    std::io::Error::other("disk full"),
                ));
            }
            self.inner.save(key, value)
        }
    }

    #[derive(Default)]
    struct Recording {
        started: usize,
        live: Vec<String>,
        finished: Vec<String>,
    }

    impl Renderer for Recording {
        fn print_message(&mut self, _: &Message) {}
        fn start_response(&mut self, _: &str) {
            self.started += 1;
        }
        fn print_live(&mut self, view: &str) {
            self.live.push(view.to_string());
        }
        fn finish_live(&mut self, final_text: &str) {
            self.finished.push(final_text.to_string());
        }
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
    }

    fn scripted(fragments: Vec<Result<String>>, history: Vec<ModelHistoryEntry>) -> Scripted {
        Scripted {
            fragments,
            history,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let mut chat = ChatOrchestrator::new(store.clone(), scripted(vec![], vec![])).unwrap();
        let mut context = chat.new_session();
        let err = chat
            .run_exchange(&mut context, "   ", &mut Recording::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(context.messages().is_empty());
        assert!(chat.registry().is_empty());
    }

    #[tokio::test]
    async fn history_is_fed_to_the_next_exchange() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let entry = ModelHistoryEntry::new(json!({"turn": 1}));
        let completion = scripted(vec![Ok("ok".to_string())], vec![entry.clone()]);
        let seen = Arc::clone(&completion.seen);
        let mut chat = ChatOrchestrator::new(store, completion).unwrap();
        let mut context = chat.new_session();
        let mut renderer = Recording::default();

        chat.run_exchange(&mut context, "one", &mut renderer)
            .await
            .unwrap();
        chat.run_exchange(&mut context, "two", &mut renderer)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("one".to_string(), vec![]));
        assert_eq!(seen[1], ("two".to_string(), vec![entry]));
        assert_eq!(context.messages().len(), 4);
        assert_eq!(chat.registry().len(), 1);
    }

    #[tokio::test]
    async fn stream_failure_skips_persistence() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let completion = scripted(
            vec![
                Ok("partial".to_string()),
                Ok("resp".to_string()),
                Err(Error::api(500, None, "boom")),
            ],
            vec![],
        );
        let mut chat = ChatOrchestrator::new(store.clone(), completion).unwrap();
        let mut context = chat.new_session();
        let mut renderer = Recording::default();

        let err = chat
            .run_exchange(&mut context, "hello", &mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_streaming());
        assert_eq!(renderer.finished, vec!["partial resp".to_string()]);
        assert_eq!(context.messages(), &[Message::user("hello")]);
        assert!(!store.contains(&StorageKey::Messages(context.id().clone())));
        assert!(!store.contains(&StorageKey::History(context.id().clone())));
        // The session was registered before the model was invoked.
        assert!(chat.registry().contains(context.id()));
    }

    #[tokio::test]
    async fn send_failure_skips_persistence() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let mut chat = ChatOrchestrator::new(store.clone(), Unreachable).unwrap();
        let mut context = chat.new_session();
        let mut renderer = Recording::default();

        let err = chat
            .run_exchange(&mut context, "hello", &mut renderer)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(context.messages(), &[Message::user("hello")]);
        assert!(context.model_history().is_empty());
        assert_eq!(renderer.started, 0);
        assert!(renderer.live.is_empty());
        assert!(renderer.finished.is_empty());
        assert!(!store.contains(&StorageKey::Messages(context.id().clone())));
        assert!(!store.contains(&StorageKey::History(context.id().clone())));
    }

    #[tokio::test]
    async fn failed_history_write_leaves_messages_unwritten() {
        let store = Arc::new(HistoryWritesFail::default());
        let completion = scripted(vec![Ok("ok".to_string())], vec![]);
        let mut chat = ChatOrchestrator::new(store.clone(), completion).unwrap();
        let mut context = chat.new_session();

        let err = chat
            .run_exchange(&mut context, "hello", &mut Recording::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!store.inner.contains(&StorageKey::Messages(context.id().clone())));

        let restored = chat.select(context.id().clone());
        assert_eq!(restored.state(), SessionState::Fresh);
        assert!(restored.masked_load_failure().is_none());
    }

    #[tokio::test]
    async fn later_success_persists_earlier_user_message() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let failing = scripted(vec![Err(Error::streaming("reset", None))], vec![]);
        let mut chat = ChatOrchestrator::new(store.clone(), failing).unwrap();
        let mut context = chat.new_session();
        let _ = chat
            .run_exchange(&mut context, "first", &mut Recording::default())
            .await;

        let succeeding = scripted(vec![Ok("fine".to_string())], vec![]);
        let mut chat = ChatOrchestrator::new(store.clone(), succeeding).unwrap();
        chat.run_exchange(&mut context, "second", &mut Recording::default())
            .await
            .unwrap();

        let stored: Vec<Message> =
            load_json(store.as_ref(), &StorageKey::Messages(context.id().clone())).unwrap();
        assert_eq!(
            stored,
            vec![
                Message::user("first"),
                Message::user("second"),
                Message::assistant("fine", AI_AVATAR),
            ]
        );
    }

    #[tokio::test]
    async fn session_choices_put_current_first() {
        let store = Arc::new(MemoryTranscriptStore::new());
        let mut chat =
            ChatOrchestrator::new(store, scripted(vec![Ok("hi".to_string())], vec![])).unwrap();
        let mut used = chat.new_session();
        chat.run_exchange(&mut used, "hello", &mut Recording::default())
            .await
            .unwrap();

        let fresh = SessionContext::fresh("99.0".parse().unwrap());
        let choices = chat.session_choices(&fresh);
        assert_eq!(choices.len(), 2);
        assert!(choices[0].is_current);
        assert_eq!(choices[0].title, "ChatSession-99.0");
        assert_eq!(&choices[1].id, used.id());

        let restored = chat.select(used.id().clone());
        assert_eq!(restored.state(), SessionState::Restored);
        assert_eq!(chat.session_choices(&restored).len(), 1);
    }
}
