//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` / `open_objects` - Config and object store setup
//! - `require_owner` - Identity check for owner-scoped commands
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use tally_core::{config::Config, db::Database, storage::LocalObjectStore};
use tracing::debug;

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    debug!(path = path_str, "Opening database");
    Database::new(path_str).context("Failed to open database")
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load config")
}

pub fn open_objects(config: &Config) -> Result<LocalObjectStore> {
    LocalObjectStore::new(&config.storage.dir).with_context(|| {
        format!(
            "Failed to open storage directory {}",
            config.storage.dir.display()
        )
    })
}

/// Owner-scoped commands need `--owner` or `TALLY_OWNER`
pub fn require_owner(owner: Option<&str>) -> Result<&str> {
    match owner.map(str::trim) {
        Some(owner) if !owner.is_empty() => Ok(owner),
        _ => bail!("No owner given. Pass --owner <id> or set TALLY_OWNER"),
    }
}

pub fn cmd_init(db_path: &Path, config: &Config) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;
    let objects = open_objects(config)?;
    println!("   Storage: {}", objects.root().display());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Preview a file: tally preview \"Janeiro 2025.xlsx\"");
    println!("  2. Upload files:   tally --owner <id> upload *.xlsx");
    println!("  3. Ask questions:  tally --owner <id> ask \"Qual produto vendeu mais?\"");

    Ok(())
}
