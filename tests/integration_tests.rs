//! Integration tests for the Talkie library.
//! These tests drive whole exchanges against an on-disk store with a scripted backend.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;
    use serde_json::json;

    use talkie::chat::{ChatOrchestrator, Renderer};
    use talkie::store::load_json;
    use talkie::{
        AI_AVATAR, ChatHandle, ChatSessionId, Completion, ExchangeLogger, FileTranscriptStore,
        FragmentStream, JsonLinesLogger, Message, ModelHistoryEntry, RegistryState, Result,
        SessionContext, SessionRegistry, SessionState, StorageKey, TranscriptStore,
    };

    /// Replies with fixed fragments and reports a fixed history.
    struct Canned {
        fragments: Vec<String>,
        history: Vec<ModelHistoryEntry>,
    }

    struct CannedChat {
        fragments: Vec<String>,
        history: Vec<ModelHistoryEntry>,
    }

    impl Completion for Canned {
        type Chat = CannedChat;

        fn start_session(&self, _: Vec<ModelHistoryEntry>) -> CannedChat {
            CannedChat {
                fragments: self.fragments.clone(),
                history: self.history.clone(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatHandle for CannedChat {
        async fn send(&mut self, _: &str) -> Result<FragmentStream> {
            let fragments: Vec<Result<String>> =
                std::mem::take(&mut self.fragments).into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(fragments)))
        }

        fn history(&self) -> Vec<ModelHistoryEntry> {
            self.history.clone()
        }
    }

    #[derive(Default)]
    struct Transcript {
        messages: Vec<Message>,
        live: Vec<String>,
        finished: Vec<String>,
    }

    impl Renderer for Transcript {
        fn print_message(&mut self, message: &Message) {
            self.messages.push(message.clone());
        }
        fn start_response(&mut self, _: &str) {}
        fn print_live(&mut self, view: &str) {
            self.live.push(view.to_string());
        }
        fn finish_live(&mut self, final_text: &str) {
            self.finished.push(final_text.to_string());
        }
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
    }

    fn canned(fragments: &[&str], history: Vec<ModelHistoryEntry>) -> Canned {
        Canned {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            history,
        }
    }

    #[tokio::test]
    async fn exchange_is_persisted_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TranscriptStore> = Arc::new(FileTranscriptStore::new(dir.path()));
        let entry1 = ModelHistoryEntry::new(json!({"role": "model", "parts": [{"text": "Hi"}]}));

        let mut chat =
            ChatOrchestrator::new(Arc::clone(&store), canned(&["Hi there"], vec![entry1.clone()]))
                .unwrap();
        let mut context = chat.new_session();
        let id = context.id().clone();
        let mut renderer = Transcript::default();

        chat.run_exchange(&mut context, "hello", &mut renderer)
            .await
            .unwrap();

        let expected = vec![
            Message::user("hello"),
            Message::assistant("Hi there", AI_AVATAR),
        ];
        assert_eq!(context.messages(), expected.as_slice());
        assert_eq!(context.model_history(), &[entry1.clone()]);
        assert_eq!(renderer.live, vec!["Hi there ▌".to_string()]);
        assert_eq!(renderer.finished, vec!["Hi there".to_string()]);

        // Everything is on disk under the id-derived names.
        assert!(dir.path().join("past_chats.json").exists());
        assert!(dir.path().join(format!("{id}-messages.json")).exists());
        assert!(dir.path().join(format!("{id}-model-history.json")).exists());

        let registry: RegistryState = load_json(store.as_ref(), &StorageKey::Registry).unwrap();
        assert_eq!(registry[&id].title, format!("ChatSession-{id}"));
        let stored: Vec<Message> =
            load_json(store.as_ref(), &StorageKey::Messages(id.clone())).unwrap();
        assert_eq!(stored, expected);

        // A new process sees the same session.
        let registry = SessionRegistry::load(Arc::clone(&store)).unwrap();
        assert!(registry.contains(&id));
        let restored = SessionContext::select(store.as_ref(), &registry, id.clone());
        assert_eq!(restored.state(), SessionState::Restored);
        assert_eq!(restored.messages(), expected.as_slice());
        assert_eq!(restored.model_history(), &[entry1]);
        assert_eq!(restored.title(), format!("ChatSession-{id}"));
    }

    #[tokio::test]
    async fn replies_are_rebranded_once_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TranscriptStore> = Arc::new(FileTranscriptStore::new(dir.path()));
        let mut chat =
            ChatOrchestrator::new(store, canned(&["Gemini", "by", "Google"], vec![])).unwrap();
        let mut context = chat.new_session();
        let mut renderer = Transcript::default();

        chat.run_exchange(&mut context, "who are you?", &mut renderer)
            .await
            .unwrap();

        assert_eq!(
            renderer.live,
            vec![
                "Gemini ▌".to_string(),
                "Gemini by ▌".to_string(),
                "Gemini by Google ▌".to_string(),
            ]
        );
        assert_eq!(context.messages()[1].content, "Talkie by Team Brackets");
    }

    #[tokio::test]
    async fn sessions_are_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TranscriptStore> = Arc::new(FileTranscriptStore::new(dir.path()));
        let mut chat = ChatOrchestrator::new(store, canned(&["ok"], vec![])).unwrap();

        let older = chat.select("1700000000.000001".parse::<ChatSessionId>().unwrap());
        let newer = chat.select("1700000500.000001".parse::<ChatSessionId>().unwrap());
        for mut context in [older, newer] {
            chat.run_exchange(&mut context, "hi", &mut Transcript::default())
                .await
                .unwrap();
        }

        let active = chat.new_session();
        let choices = chat.session_choices(&active);
        let ids: Vec<&str> = choices.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                active.id().as_str(),
                "1700000500.000001",
                "1700000000.000001"
            ]
        );
        assert!(choices[0].is_current);
        assert!(!choices[1].is_current);
    }

    #[tokio::test]
    async fn corrupt_transcript_starts_fresh_and_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TranscriptStore> = Arc::new(FileTranscriptStore::new(dir.path()));
        let id: ChatSessionId = "1700000000.000001".parse().unwrap();
        store
            .save(&StorageKey::Messages(id.clone()), b"not json")
            .unwrap();
        store
            .save(&StorageKey::History(id.clone()), b"[]")
            .unwrap();

        let log_path = dir.path().join("exchanges.jsonl");
        let logger: Arc<dyn ExchangeLogger> = Arc::new(JsonLinesLogger::open(&log_path).unwrap());
        let chat = ChatOrchestrator::new(store, canned(&[], vec![]))
            .unwrap()
            .with_logger(logger);

        let context = chat.select(id);
        assert_eq!(context.state(), SessionState::Fresh);
        assert!(context.messages().is_empty());
        assert!(context.masked_load_failure().is_some());

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("masked_load_failure"));
    }
}
