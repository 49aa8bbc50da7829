// Public modules
pub mod message;
pub mod model_history;
pub mod session_id;
pub mod session_record;

// Re-exports
pub use message::{AI_AVATAR, Message, MessageRole};
pub use model_history::ModelHistoryEntry;
pub use session_id::ChatSessionId;
pub use session_record::{SessionRecord, placeholder_title};
