//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to pick and inspect sessions without sending messages
//! to the model.

use crate::types::ChatSessionId;

/// Names a session in `/switch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSelector {
    /// One-based position in the `/sessions` listing.
    Index(usize),
    /// A session id.
    Id(ChatSessionId),
}

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new session.
    New,

    /// List known sessions.
    Sessions,

    /// Switch to another session and replay its messages.
    Switch(SessionSelector),

    /// Re-render the active transcript.
    History,

    /// Show the active session's id and title.
    Title,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use talkie::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch 2").is_some());
/// assert!(parse_command("What helps a sore throat?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "sessions" | "chats" => ChatCommand::Sessions,
        "switch" | "open" => match argument {
            Some(arg) => parse_selector(arg),
            None => ChatCommand::Invalid("/switch requires a session number or id".to_string()),
        },
        "history" => ChatCommand::History,
        "title" => ChatCommand::Title,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_selector(arg: &str) -> ChatCommand {
    // Ids always contain a '.', so a bare number is a listing position.
    if arg.chars().all(|c| c.is_ascii_digit()) {
        return match arg.parse::<usize>() {
            Ok(index) if index > 0 => ChatCommand::Switch(SessionSelector::Index(index)),
            _ => ChatCommand::Invalid("/switch expects a session number from /sessions".to_string()),
        };
    }
    match arg.parse::<ChatSessionId>() {
        Ok(id) => ChatCommand::Switch(SessionSelector::Id(id)),
        Err(err) => ChatCommand::Invalid(format!("/switch {err}")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat session
  /sessions              List past chat sessions
  /switch <n|id>         Open a past session by number or id
  /history               Show the messages of this session again
  /title                 Show this session's id and title
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/NEW"), Some(ChatCommand::New));
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(parse_command("/title"), Some(ChatCommand::Title));
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
    }

    #[test]
    fn parse_switch_by_index() {
        assert_eq!(
            parse_command("/switch 2"),
            Some(ChatCommand::Switch(SessionSelector::Index(2)))
        );
        assert!(matches!(
            parse_command("/switch 0"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("session number")
        ));
    }

    #[test]
    fn parse_switch_by_id() {
        let id: ChatSessionId = "1700000000.123456".parse().unwrap();
        assert_eq!(
            parse_command("/switch   1700000000.123456 "),
            Some(ChatCommand::Switch(SessionSelector::Id(id)))
        );
    }

    #[test]
    fn parse_switch_rejects_paths() {
        assert!(matches!(
            parse_command("/switch ../past_chats"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/switch"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gemini-1.5-pro"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello, Talkie!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for name in ["/new", "/sessions", "/switch", "/history", "/title", "/help", "/quit"] {
            assert!(help.contains(name), "missing {name}");
        }
    }
}
