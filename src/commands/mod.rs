/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`: Interactive chat REPL
- `ask`: One-shot question streamed to stdout
- `history`: List, show, delete, and clear stored conversations

Handlers share one [`AppContext`] built from the configuration at startup;
nothing is global.
*/

use crate::chat::{ChatSession, HttpChatBackend, SendOutcome, SessionEvent};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::storage::{default_storage_path, MemoryStore, SledStore, SnapshotStore};
use colored::Colorize;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Special commands parser for the chat REPL
pub mod special_commands;

// History management commands
pub mod history;

/// Open the persistence port described by the configuration
///
/// When the durable store cannot be opened (for example another process
/// holds it) the history for this run is kept in memory only.
pub fn open_port(config: &Config) -> Arc<dyn SnapshotStore> {
    let path = match &config.storage.path {
        Some(path) => Ok(path.clone()),
        None => default_storage_path(),
    };

    match path.and_then(SledStore::open) {
        Ok(store) => {
            tracing::info!(path = %store.path().display(), "Using conversation history");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "History storage unavailable; conversations will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Open the conversation store described by the configuration
pub fn open_store(config: &Config) -> ConversationStore {
    ConversationStore::open(open_port(config))
}

/// Application state shared by the interactive handlers
pub struct AppContext {
    /// The chat session, which also owns the conversation store
    pub session: ChatSession,
}

impl AppContext {
    /// Build the store, backend, and session from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP backend cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(config);
        let backend = HttpChatBackend::new(&config.chat)?;
        let session = ChatSession::new(
            Arc::new(backend),
            Arc::new(Mutex::new(store)),
            Duration::from_secs(config.chat.stream_timeout_seconds),
        );
        Ok(Self { session })
    }

    /// Resolve a conversation id or prefix, or fall back to the most recent one
    ///
    /// With `fresh` set a new conversation is created instead.
    pub fn select_conversation(&self, requested: Option<&str>, fresh: bool) -> Result<String> {
        let store = self.session.store();
        let mut store = store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if fresh {
            return Ok(store.create_conversation().id);
        }
        if let Some(requested) = requested {
            return store.resolve_id(requested);
        }

        let latest = store
            .conversations()
            .iter()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id.clone());
        match latest {
            Some(id) => Ok(id),
            None => Ok(store.create_conversation().id),
        }
    }
}

/// Send one message and render the streamed reply to stdout
///
/// Ctrl-C while the reply streams stops the generation.
pub async fn stream_reply(
    session: &ChatSession,
    conversation_id: &str,
    text: &str,
) -> Result<SendOutcome> {
    let mut events = session.subscribe();
    let send = session.send(conversation_id, text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Some(event) = events.recv() => render_event(event),
            _ = tokio::signal::ctrl_c() => {
                if session.stop() {
                    tracing::debug!("Stop requested by user");
                }
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        render_event(event);
    }

    outcome
}

fn render_event(event: SessionEvent) {
    match event {
        SessionEvent::Started { .. } => {
            print!("\n{} ", "assistant:".blue().bold());
            let _ = std::io::stdout().flush();
        }
        SessionEvent::Delta(fragment) => {
            print!("{}", fragment);
            let _ = std::io::stdout().flush();
        }
        SessionEvent::Completed(_) => println!("\n"),
        SessionEvent::Failed(error) => {
            println!();
            eprintln!("{}\n", error.user_message().red());
        }
    }
}

// One-shot question handler
pub mod ask {
    //! Sends a single question and streams the answer.

    use super::*;

    /// Ask one question in an existing or new conversation
    pub async fn run_ask(config: Config, message: String, conversation: Option<String>) -> Result<()> {
        let context = AppContext::from_config(&config)?;
        let conversation_id =
            context.select_conversation(conversation.as_deref(), conversation.is_none())?;

        match stream_reply(&context.session, &conversation_id, &message).await? {
            SendOutcome::Completed(_) => {
                println!(
                    "Continue with {}",
                    format!(
                        "folio-chat chat --conversation {}",
                        history::short_id(&conversation_id)
                    )
                    .cyan()
                );
            }
            SendOutcome::Failed(_) => {}
            SendOutcome::Ignored => {
                println!("{}", "Nothing to send.".yellow());
            }
        }
        Ok(())
    }
}

// Interactive chat handler
pub mod chat {
    //! Interactive chat REPL.
    //!
    //! Reads lines with rustyline; slash commands manage conversations and
    //! everything else is sent to the assistant.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    pub async fn run_chat(config: Config, conversation: Option<String>, new: bool) -> Result<()> {
        let context = AppContext::from_config(&config)?;
        let mut current = context.select_conversation(conversation.as_deref(), new)?;

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&context, &current);

        loop {
            let prompt = format!("{} ", "you>".green().bold());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {
                            stream_reply(&context.session, &current, trimmed).await?;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(command) => {
                            if let Err(e) = apply_command(&context, &mut current, command) {
                                eprintln!("{}\n", e.to_string().red());
                            }
                        }
                        Err(e) => eprintln!("{}\n", e.to_string().red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Apply a conversation-management command
    ///
    /// `current` is updated whenever the active conversation changes.
    pub fn apply_command(
        context: &AppContext,
        current: &mut String,
        command: SpecialCommand,
    ) -> Result<()> {
        let store = context.session.store();
        let mut store = store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        match command {
            SpecialCommand::New => {
                *current = store.create_conversation().id;
                println!("{}\n", "Started a new conversation.".green());
            }
            SpecialCommand::List => {
                let summaries = store.conversations().iter().map(|c| c.summary()).collect();
                history::print_conversation_table(summaries, Some(current.as_str()));
            }
            SpecialCommand::Switch(requested) => {
                let id = store.resolve_id(&requested)?;
                if let Some(conversation) = store.get(&id) {
                    println!("Switched to {}", conversation.title.bold());
                    for message in &conversation.messages {
                        history::print_message(message.role, &message.content);
                    }
                    println!();
                }
                *current = id;
            }
            SpecialCommand::Title(title) => {
                store.update_title(current, title)?;
                println!("{}\n", "Conversation renamed.".green());
            }
            SpecialCommand::Show => {
                if let Some(conversation) = store.get(current) {
                    println!("\n{}", conversation.title.bold());
                    for message in &conversation.messages {
                        history::print_message(message.role, &message.content);
                    }
                    println!();
                }
            }
            SpecialCommand::Clear => {
                store.clear_messages(current)?;
                println!("{}\n", "Conversation cleared.".green());
            }
            SpecialCommand::Delete => {
                *current = store.delete_conversation(current)?;
                let title = store
                    .get(current)
                    .map(|c| c.title.clone())
                    .unwrap_or_default();
                println!("{} Now in {}\n", "Conversation deleted.".green(), title.bold());
            }
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
        Ok(())
    }

    fn print_welcome_banner(context: &AppContext, current: &str) {
        let store = context.session.store();
        let store = store.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let title = store
            .get(current)
            .map(|c| c.title.clone())
            .unwrap_or_default();

        println!("\n{}", "Portfolio assistant".bold());
        println!(
            "Conversation: {} ({})",
            title.bold(),
            history::short_id(current).cyan()
        );
        println!("Type {} for commands.\n", "/help".cyan());
    }
}
