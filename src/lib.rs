//! Talkie: a chat assistant that keeps its conversations.
//!
//! Sessions are identified by [`ChatSessionId`], listed in a [`SessionRegistry`], and stored
//! through a [`TranscriptStore`].  Each prompt runs one exchange through
//! [`chat::ChatOrchestrator`], which streams the reply from a [`Completion`] backend,
//! assembles it with a [`StreamAccumulator`], and persists the updated transcript.

// Public modules
pub mod accumulator;
pub mod chat;
pub mod completion;
pub mod error;
pub mod exchange_logger;
pub mod gemini;
pub mod observability;
pub mod registry;
pub mod render;
pub mod session;
pub mod sse;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use accumulator::{Branding, CURSOR, StreamAccumulator};
pub use completion::{ChatHandle, Completion, FragmentStream};
pub use error::{Error, Result};
pub use exchange_logger::{ExchangeLogger, JsonLinesLogger};
pub use gemini::{Gemini, GeminiChat};
pub use observability::register_biometrics;
pub use registry::{RegistryState, SessionRegistry};
pub use session::{SessionContext, SessionState};
pub use store::{FileTranscriptStore, MemoryTranscriptStore, StorageKey, TranscriptStore};
pub use types::*;
