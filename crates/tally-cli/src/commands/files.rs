//! Uploaded file commands (list, delete)

use anyhow::Result;
use tally_core::{
    config::Config, db::Database, pipeline::Pipeline, storage::LocalObjectStore,
    store::FileRegistry,
};

use super::truncate;

pub fn cmd_files(db: &Database, owner: &str) -> Result<()> {
    let files = db.list_files(owner)?;

    if files.is_empty() {
        println!("No files uploaded yet. Run 'tally upload <files>' first.");
        return Ok(());
    }

    println!();
    println!("{:<40} {:>10}  {:<16}", "Key", "Size", "Uploaded");
    println!("{}", "─".repeat(70));
    for file in &files {
        println!(
            "{:<40} {:>10}  {:<16}",
            truncate(&file.key, 40),
            file.size_bytes,
            file.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("{} file(s)", files.len());

    Ok(())
}

pub fn cmd_delete(
    db: &Database,
    objects: &LocalObjectStore,
    config: &Config,
    owner: &str,
    key: &str,
) -> Result<()> {
    let pipeline = Pipeline::new(db, objects, config.ingest.clone());
    let report = pipeline.delete_file(owner, key)?;

    println!("🗑️  Deleted {}", report.key);
    println!("   Records removed: {}", report.records_deleted);
    if !report.object_deleted {
        println!("   ⚠️  Stored bytes were already missing");
    }

    Ok(())
}
