//! Status command implementation

use std::fs;
use std::path::Path;

use anyhow::Result;
use tally_core::{config::Config, store::RecordStore};

use super::open_db;
use super::upload::print_period_counts;

pub fn cmd_status(db_path: &Path, config: &Config, owner: Option<&str>) -> Result<()> {
    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }
    println!("   Storage: {}", config.storage.dir.display());
    println!(
        "   Chunk size: {}  Atomic replace: {}",
        config.ingest.chunk_size, config.ingest.atomic_replace
    );

    if !db_path.exists() {
        println!();
        return Ok(());
    }

    let Some(owner) = owner else {
        println!();
        println!("   Pass --owner to see record counts");
        println!();
        return Ok(());
    };

    match open_db(db_path) {
        Ok(db) => {
            println!();
            println!("   Owner: {}", owner);
            println!("   Records: {}", db.count_records(owner)?);
            println!();
            print_period_counts(&db.count_by_period(owner)?);
        }
        Err(e) => {
            println!();
            println!("   ❌ Error opening database: {:#}", e);
        }
    }

    println!();
    Ok(())
}
