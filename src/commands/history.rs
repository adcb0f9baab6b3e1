use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::conversation::{ConversationSummary, Role};
use crate::error::Result;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let mut store = super::open_store(config);

    match command {
        HistoryCommand::List => {
            let summaries: Vec<ConversationSummary> =
                store.load().iter().map(|c| c.summary()).collect();

            if summaries.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            println!("\nConversation History:");
            print_conversation_table(summaries, None);
            println!(
                "Use {} to resume a conversation.",
                "folio-chat chat --conversation <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let id = store.resolve_id(&id)?;
            if let Some(conversation) = store.get(&id) {
                println!("\n{}  {}", conversation.title.bold(), short_id(&id).cyan());
                for message in &conversation.messages {
                    print_message(message.role, &message.content);
                }
                println!();
            }
        }
        HistoryCommand::Delete { id } => {
            let id = store.resolve_id(&id)?;
            store.delete_conversation(&id)?;
            println!("{}", format!("Deleted conversation {}", short_id(&id)).green());
        }
        HistoryCommand::Clear => {
            store.clear_all();
            println!("{}", "Cleared all conversation history.".green());
        }
    }

    Ok(())
}

/// Print conversations as a table, most recently updated first
///
/// `active` marks the conversation the caller currently has open.
pub fn print_conversation_table(mut summaries: Vec<ConversationSummary>, active: Option<&str>) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for summary in summaries {
        let marker = if active == Some(summary.id.as_str()) {
            "*"
        } else {
            " "
        };
        let id = format!("{}{}", marker, short_id(&summary.id));
        let updated = summary.updated_at.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            id.cyan(),
            truncate_chars(&summary.title, 40),
            summary.message_count,
            updated
        ]);
    }

    table.printstd();
    println!();
}

/// Print one message with a colored role label
pub fn print_message(role: Role, content: &str) {
    let label = match role {
        Role::User => "you".green().bold(),
        Role::Assistant => "assistant".blue().bold(),
    };
    println!("\n{}: {}", label, content);
}

/// First eight characters of a conversation id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
