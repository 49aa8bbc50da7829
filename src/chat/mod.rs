//! Chat application module for persistent, streamed conversations.
//!
//! This module provides the pieces the `talkie` REPL is assembled from:
//!
//! - [`orchestrator`]: runs one exchange against a session and persists it
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing for session control

mod commands;
mod config;
mod orchestrator;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, SessionSelector, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ConfigFile, Replacement};
pub use orchestrator::{ChatOrchestrator, SessionChoice};
