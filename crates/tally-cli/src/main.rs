//! Tally CLI - Sales spreadsheet ingestion
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally upload "Janeiro 2025.xlsx"    Upload and ingest spreadsheets
//!   tally summary                       Print the fact sheet
//!   tally ask "Qual produto vendeu mais?"

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let owner = cli.owner.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, &config),
        Commands::Preview { file, json } => commands::cmd_preview(&file, &config, json),
        Commands::Upload { files } => {
            let db = commands::open_db(&cli.db)?;
            let objects = commands::open_objects(&config)?;
            commands::cmd_upload(&db, &objects, &config, commands::require_owner(owner)?, &files)
        }
        Commands::Files => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_files(&db, commands::require_owner(owner)?)
        }
        Commands::Delete { key } => {
            let db = commands::open_db(&cli.db)?;
            let objects = commands::open_objects(&config)?;
            commands::cmd_delete(&db, &objects, &config, commands::require_owner(owner)?, &key)
        }
        Commands::Reprocess => {
            let db = commands::open_db(&cli.db)?;
            let objects = commands::open_objects(&config)?;
            commands::cmd_reprocess(&db, &objects, &config, commands::require_owner(owner)?)
        }
        Commands::Summary => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_summary(&db, &config, commands::require_owner(owner)?)
        }
        Commands::Ask { question } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_ask(&db, &config, commands::require_owner(owner)?, &question)
        }
        Commands::Status => commands::cmd_status(&cli.db, &config, owner),
    }
}
