//! Parley CLI, the main entry point.
//!
//! Commands:
//! - `chat`    Send one message, or chat interactively
//! - `modes`   List chat modes and the keys they need
//! - `tools`   List the tools the agent service offers
//! - `config`  Show, locate, or validate the configuration

use clap::{Parser, Subcommand};
use parley_core::mode::ChatModeId;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: streaming chat, search, and tool-using agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a model, a search-grounded model, or an agent
    Chat {
        /// Chat mode
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ChatModeId>,

        /// Model id (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Enable a tool for agent modes (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,
    },

    /// List chat modes
    Modes,

    /// List tools offered by the agent service
    Tools,

    /// Configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets omitted)
    Show,
    /// Print the config file path
    Path,
    /// Check the configuration for problems
    Validate,
}

fn parse_mode(id: &str) -> Result<ChatModeId, String> {
    ChatModeId::ALL
        .into_iter()
        .find(|mode| mode.as_str() == id)
        .ok_or_else(|| {
            let known: Vec<&str> = ChatModeId::ALL.iter().map(|m| m.as_str()).collect();
            format!("unknown mode '{id}' (expected one of: {})", known.join(", "))
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            mode,
            model,
            message,
            tools,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                mode,
                model,
                message,
                tools,
            })
            .await?
        }
        Commands::Modes => commands::modes::run()?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
