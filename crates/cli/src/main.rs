//! Marketstall CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ms-cli migrate
//!
//! # Wipe every table, then load the demo accounts and products
//! ms-cli reset --seed
//!
//! # Bring legacy vendor/buyer exports into the unified users table
//! ms-cli legacy import --vendors vendors.json --buyers buyers.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `reset` - Truncate all tables, optionally seeding demo data
//! - `legacy import` - Import legacy JSON exports

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(author, version, about = "Marketstall CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete all data (accounts, catalog, orders, automation)
    Reset {
        /// Load demo vendors, buyers and products afterwards
        #[arg(long)]
        seed: bool,
    },
    /// Legacy data tools
    Legacy {
        #[command(subcommand)]
        action: LegacyAction,
    },
}

#[derive(Subcommand)]
enum LegacyAction {
    /// Import legacy vendor and buyer exports (JSON arrays)
    Import {
        /// Legacy vendors export
        #[arg(long)]
        vendors: Option<PathBuf>,

        /// Legacy buyers export
        #[arg(long)]
        buyers: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), commands::CliError> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Reset { seed } => commands::reset::run(seed).await?,
        Commands::Legacy { action } => match action {
            LegacyAction::Import { vendors, buyers } => {
                commands::legacy::import(vendors.as_deref(), buyers.as_deref()).await?;
            }
        },
    }
    Ok(())
}
