//! Command-line interface definition for folio-chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot questions, and
//! conversation history management.

use clap::{Parser, Subcommand};

/// folio-chat - portfolio AI assistant in the terminal
///
/// Chat with the portfolio assistant endpoint; conversations are kept
/// locally for 30 days after their last message.
#[derive(Parser, Debug, Clone)]
#[command(name = "folio-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Directory of the conversation history database
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Resume a conversation by id or id prefix
        #[arg(short = 'r', long)]
        conversation: Option<String>,

        /// Start in a new conversation
        #[arg(short, long, conflicts_with = "conversation")]
        new: bool,
    },

    /// Ask a single question and stream the answer
    Ask {
        /// The question to send
        message: String,

        /// Conversation id or id prefix to continue
        #[arg(short = 'r', long)]
        conversation: Option<String>,
    },

    /// Manage stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryCommand {
    /// List stored conversations
    List,

    /// Print every message of a conversation
    Show {
        /// Conversation id or id prefix
        id: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id or id prefix
        id: String,
    },

    /// Erase all stored conversations
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            storage_path: None,
            verbose: false,
            command: Commands::History {
                command: HistoryCommand::List,
            },
        }
    }
}
