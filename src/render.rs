//! Output rendering for the chat application.
//!
//! The orchestrator only talks to a [`Renderer`]; the terminal implementation lives here and
//! uses ANSI escape codes for role labels and errors.

use std::io::{self, Stdout, Write};

use crate::accumulator::CURSOR;
use crate::types::{Message, MessageRole};

/// ANSI escape code for dim text (used for informational output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Erases the single-column cursor glyph.
const ERASE_CURSOR: &str = "\x08 \x08";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a complete message, e.g. while replaying a restored session.
    fn print_message(&mut self, message: &Message);

    /// Called when an assistant reply is about to stream in.
    fn start_response(&mut self, avatar: &str);

    /// Show the latest live view of the reply being typed.
    ///
    /// Every view is the full text so far followed by the cursor glyph.
    fn print_live(&mut self, view: &str);

    /// Replace the live view with the final text of the reply.
    fn finish_live(&mut self, final_text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    shown: String,
    cursor_visible: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            shown: String::new(),
            cursor_visible: false,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn label(&self, role: MessageRole, avatar: Option<&str>) -> String {
        let name = match avatar {
            Some(avatar) => format!("{avatar} {}", role.label()),
            None => role.label().to_string(),
        };
        if !self.use_color {
            return format!("{name}:");
        }
        let color = match role {
            MessageRole::User => ANSI_CYAN,
            MessageRole::Assistant => ANSI_GREEN,
        };
        format!("{color}{name}:{ANSI_RESET}")
    }

    fn erase_cursor(&mut self) {
        if self.cursor_visible {
            print!("{ERASE_CURSOR}");
            self.cursor_visible = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_message(&mut self, message: &Message) {
        let label = self.label(message.role, message.avatar.as_deref());
        println!("{label}");
        println!("{}", message.content);
        println!();
    }

    fn start_response(&mut self, avatar: &str) {
        self.shown.clear();
        self.cursor_visible = false;
        let label = self.label(MessageRole::Assistant, Some(avatar));
        println!("{label}");
        self.flush();
    }

    fn print_live(&mut self, view: &str) {
        let body = view.strip_suffix(CURSOR).unwrap_or(view);
        self.erase_cursor();
        match body.strip_prefix(self.shown.as_str()) {
            Some(suffix) => print!("{suffix}"),
            None => print!("\n{body}"),
        }
        self.shown = body.to_string();
        print!("{CURSOR}");
        self.cursor_visible = true;
        self.flush();
    }

    fn finish_live(&mut self, final_text: &str) {
        self.erase_cursor();
        let shown = std::mem::take(&mut self.shown);
        if shown.trim() == final_text {
            println!();
        } else if shown.is_empty() {
            println!("{final_text}");
        } else {
            // The final text can differ from what streamed because of branding.
            println!();
            println!("{final_text}");
        }
        println!();
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn plain_labels() {
        let renderer = PlainTextRenderer::with_color(false);
        assert_eq!(renderer.label(MessageRole::User, None), "You:");
        assert_eq!(
            renderer.label(MessageRole::Assistant, Some("🤖")),
            "🤖 Talkie:"
        );
    }

    #[test]
    fn live_views_track_shown_text() {
        let mut renderer = PlainTextRenderer::with_color(false);
        renderer.start_response("🤖");
        renderer.print_live("a ▌");
        renderer.print_live("a b ▌");
        assert_eq!(renderer.shown, "a b ");
        assert!(renderer.cursor_visible);
        renderer.finish_live("a b");
        assert!(renderer.shown.is_empty());
        assert!(!renderer.cursor_visible);
    }
}
