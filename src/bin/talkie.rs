//! Interactive chat application that keeps its conversations.
//!
//! Every session is stored under the data directory and can be reopened later, either with
//! `--session <id>` or from inside the REPL.
//!
//! # Usage
//!
//! ```bash
//! # Start a new session with the default model
//! talkie
//!
//! # Resume a stored session
//! talkie --session 1700000000.123456
//!
//! # Keep chats elsewhere and log every exchange
//! talkie --data-dir ~/.talkie --log-file ~/.talkie/exchanges.jsonl
//! ```
//!
//! # Commands
//!
//! - `/new` - Start a new session
//! - `/sessions` - List past sessions
//! - `/switch <n|id>` - Open a past session
//! - `/history` - Show the active transcript again
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use talkie::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatOrchestrator, PlainTextRenderer, Renderer,
    SessionSelector, help_text, parse_command,
};
use talkie::{
    ChatSessionId, Completion, FileTranscriptStore, Gemini, JsonLinesLogger, SessionContext,
    SessionState, TranscriptStore,
};

/// Main entry point for the talkie application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("talkie [OPTIONS]");
    let config = ChatConfig::resolve(args)?;

    let client = Gemini::with_options(
        None,
        &config.api_key_env,
        config.base_url.as_deref(),
        config.model.clone(),
        Some(config.timeout),
    )?;
    let store: Arc<dyn TranscriptStore> =
        Arc::new(FileTranscriptStore::new(config.data_dir.clone()));
    let mut orchestrator = ChatOrchestrator::new(store, client)?
        .with_branding(config.branding())
        .with_avatar(config.avatar.clone());
    if let Some(path) = config.log_file.as_ref() {
        orchestrator = orchestrator.with_logger(Arc::new(JsonLinesLogger::open(path)?));
    }
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("Talkie");
    println!("Your AI-powered medical chat assistant");
    println!("(model: {}, chats in {})", config.model, config.data_dir.display());
    println!("Type /help for commands, /quit to exit\n");

    let mut context = match config.session.as_deref() {
        Some(id) => {
            let id: ChatSessionId = id.parse()?;
            open_session(&orchestrator, id, &mut renderer)
        }
        None => orchestrator.new_session(),
    };

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::New => {
                            context = orchestrator.new_session();
                            renderer.print_info(&format!("Started {}", context.title()));
                        }
                        ChatCommand::Sessions => {
                            print_sessions(&orchestrator, &context);
                        }
                        ChatCommand::Switch(selector) => {
                            let id = match selector {
                                SessionSelector::Id(id) => Some(id),
                                SessionSelector::Index(index) => orchestrator
                                    .session_choices(&context)
                                    .into_iter()
                                    .nth(index - 1)
                                    .map(|choice| choice.id),
                            };
                            match id {
                                Some(id) => {
                                    context = open_session(&orchestrator, id, &mut renderer);
                                }
                                None => renderer.print_error("No such session; see /sessions"),
                            }
                        }
                        ChatCommand::History => {
                            replay(&context, &mut renderer);
                        }
                        ChatCommand::Title => {
                            renderer
                                .print_info(&format!("{} (id {})", context.title(), context.id()));
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - run an exchange
                if let Err(e) = orchestrator
                    .run_exchange(&mut context, line, &mut renderer)
                    .await
                {
                    renderer.print_error(&e.to_string());
                    if let Some(hint) = e.hint() {
                        renderer.print_info(hint);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn open_session<C: Completion>(
    orchestrator: &ChatOrchestrator<C>,
    id: ChatSessionId,
    renderer: &mut dyn Renderer,
) -> SessionContext {
    let context = orchestrator.select(id);
    match context.state() {
        SessionState::Restored => {
            renderer.print_info(&format!(
                "Opened {} ({} messages)",
                context.title(),
                context.messages().len()
            ));
            replay(&context, renderer);
        }
        SessionState::Fresh => {
            if let Some(err) = context.masked_load_failure() {
                renderer.print_error(&format!("Could not load stored history: {err}"));
            }
            renderer.print_info(&format!("Started {}", context.title()));
        }
    }
    context
}

fn replay(context: &SessionContext, renderer: &mut dyn Renderer) {
    for message in context.messages() {
        renderer.print_message(message);
    }
}

fn print_sessions<C: Completion>(orchestrator: &ChatOrchestrator<C>, context: &SessionContext) {
    println!("    Sessions:");
    for (index, choice) in orchestrator.session_choices(context).iter().enumerate() {
        let marker = if choice.is_current { "*" } else { " " };
        println!(
            "    {marker} {:>3}. {} ({})",
            index + 1,
            choice.title,
            choice.id
        );
    }
}
