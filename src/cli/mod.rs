pub mod commands;
pub mod utils;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::{self, AppConfig};
use crate::database::{DatabaseManager, Store};

#[derive(Parser)]
#[command(name = "learnhub")]
#[command(about = "learnhub CLI - operator tasks for the learning platform backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply SQL migrations to the configured database")]
    Migrate,

    #[command(about = "Finish every test session whose time ran out")]
    Sweep,

    #[command(about = "User accounts and moderation")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Mint a bearer token for a user (development)")]
    Token {
        #[arg(help = "Username to issue the token for")]
        username: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs: configuration plus an opened store
pub struct CliContext {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub output: OutputFormat,
}

impl CliContext {
    async fn open(output: OutputFormat) -> anyhow::Result<Self> {
        let config = config::config().clone();
        let store = DatabaseManager::open_store(&config.database).await?;
        Ok(Self { config, store, output })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::db::migrate(output_format).await,
        Commands::Sweep => commands::db::sweep(&CliContext::open(output_format).await?).await,
        Commands::User { cmd } => commands::user::handle(cmd, &CliContext::open(output_format).await?).await,
        Commands::Token { username } => commands::token::issue(&username, &CliContext::open(output_format).await?).await,
    }
}
