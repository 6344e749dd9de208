use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod history;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Run the chat relay server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start an interactive chat session against a relay
    Chat {
        /// Base URL of the relay, defaults to CHAT_RELAY_URL
        #[arg(long)]
        relay_url: Option<String>,
    },
    /// Print the stored conversation
    History {},
    /// Delete the stored conversation
    Clear {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Chat { relay_url }) => {
            let relay_url = relay_url.unwrap_or(config.relay_url.clone());
            chat::run(&relay_url, &config.history_path).await?;
        }
        Some(Command::History {}) => {
            history::print(&config.history_path)?;
        }
        Some(Command::Clear {}) => {
            history::clear(&config.history_path)?;
        }
        None => {}
    }

    Ok(())
}
