//! folio-chat - portfolio AI assistant CLI
//!
#![doc = "folio-chat - portfolio AI assistant CLI"]
#![doc = "Main entry point for the folio-chat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_chat::cli::{Cli, Commands};
use folio_chat::commands;
use folio_chat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { conversation, new } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(id) = &conversation {
                tracing::debug!("Resuming conversation: {}", id);
            }
            commands::chat::run_chat(config, conversation, new).await?;
            Ok(())
        }
        Commands::Ask {
            message,
            conversation,
        } => {
            tracing::info!("Sending one-shot question");
            commands::ask::run_ask(config, message, conversation).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed replies on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "folio_chat=debug"
    } else {
        "folio_chat=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
