//! Special commands parser for interactive chat
//!
//! Special commands manage conversations instead of being sent to the
//! assistant:
//! - Start, list, switch, rename, clear, or delete conversations
//! - Show the current conversation's transcript
//! - Display help information
//! - Exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive; arguments keep
//! their original case.

use colored::Colorize;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new conversation and make it current
    New,
    /// List stored conversations
    List,
    /// Make another conversation current (id or id prefix)
    Switch(String),
    /// Rename the current conversation
    Title(String),
    /// Print the current conversation's messages
    Show,
    /// Remove all messages from the current conversation
    Clear,
    /// Delete the current conversation
    Delete,
    /// Display help information
    Help,
    /// Exit the session
    Exit,
    /// Not a special command; send the input to the assistant
    None,
}

/// Parse user input into a special command
///
/// Input that does not start with `/` (other than the bare words `exit` and
/// `quit`) is returned as [`SpecialCommand::None`].
///
/// # Examples
///
/// ```
/// use folio_chat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::New);
/// assert_eq!(
///     parse_special_command("/switch 1a2b").unwrap(),
///     SpecialCommand::Switch("1a2b".to_string())
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name.to_lowercase(), arg.trim()),
        None => (lower, ""),
    };

    match name.as_str() {
        "/new" => Ok(SpecialCommand::New),
        "/list" | "/ls" => Ok(SpecialCommand::List),
        "/switch" | "/resume" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/switch".to_string(),
                    usage: "/switch <conversation-id>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Switch(arg.to_string()))
            }
        }
        "/title" | "/rename" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/title".to_string(),
                    usage: "/title <new title>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Title(arg.to_string()))
            }
        }
        "/show" | "/history" => Ok(SpecialCommand::Show),
        "/clear" => Ok(SpecialCommand::Clear),
        "/delete" => Ok(SpecialCommand::Delete),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print the special command reference
pub fn print_help() {
    println!("\n{}", "Conversation commands".bold());
    println!("  {}            start a new conversation", "/new".cyan());
    println!("  {}           list stored conversations", "/list".cyan());
    println!("  {}    continue another conversation", "/switch <id>".cyan());
    println!("  {} rename this conversation", "/title <text>".cyan());
    println!("  {}           print this conversation", "/show".cyan());
    println!("  {}          remove this conversation's messages", "/clear".cyan());
    println!("  {}         delete this conversation", "/delete".cyan());
    println!("  {}           quit", "/exit".cyan());
    println!(
        "\nPress {} while a reply is streaming to stop it.\n",
        "Ctrl-C".yellow()
    );
}
