//! Preview, upload and reprocess command implementations

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    config::Config,
    db::Database,
    import::parse_spreadsheet_with,
    models::{NewSale, PeriodCount},
    pipeline::{BatchReport, FileOutcome, Pipeline, Upload},
    storage::LocalObjectStore,
};

use super::truncate;

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

fn print_sample(sample: &[NewSale]) {
    for sale in sample {
        let price = sale
            .unit_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<30} {:>8} {:>10}",
            truncate(&sale.product, 30),
            sale.quantity,
            price
        );
    }
}

pub fn cmd_preview(file: &Path, config: &Config, json: bool) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    let filename = display_name(file);

    let result = parse_spreadsheet_with(&bytes, &filename, &config.ingest.parse_options())
        .with_context(|| format!("Failed to parse {}", filename))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("📄 {} ({})", filename, result.period);
    println!("   {}", result.summary_line());

    if !result.sample.is_empty() {
        println!();
        println!("   {:<30} {:>8} {:>10}", "Product", "Qty", "Price");
        println!("   ─────────────────────────────────────────────────");
        print_sample(&result.sample);
    }

    if !result.warnings.is_empty() {
        println!();
        println!("⚠️  {} warnings:", result.warnings.len());
        for warning in &result.warnings {
            println!("   - {}", warning);
        }
    }

    Ok(())
}

fn print_batch(batch: &BatchReport) {
    for outcome in &batch.outcomes {
        match outcome {
            FileOutcome::Ingested { warnings, .. } => {
                println!("   ✅ {}", outcome.summary_line());
                for warning in warnings {
                    println!("      - {}", warning);
                }
            }
            FileOutcome::Skipped { .. } => println!("   ⏭️  {}", outcome.summary_line()),
            FileOutcome::Failed { .. } => println!("   ❌ {}", outcome.summary_line()),
        }
    }
}

pub(crate) fn print_period_counts(counts: &[PeriodCount]) {
    if counts.is_empty() {
        println!("   (no records stored)");
        return;
    }
    for count in counts {
        println!("   {:<16} {:>8}", count.period.to_string(), count.records);
    }
}

pub fn cmd_upload(
    db: &Database,
    objects: &LocalObjectStore,
    config: &Config,
    owner: &str,
    files: &[impl AsRef<Path>],
) -> Result<()> {
    let mut uploads = Vec::with_capacity(files.len());
    for file in files {
        let file = file.as_ref();
        let bytes =
            fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
        uploads.push(Upload::new(display_name(file), bytes));
    }

    println!("📥 Uploading {} file(s) for {}...", uploads.len(), owner);

    let pipeline = Pipeline::new(db, objects, config.ingest.clone());
    let batch = pipeline.upload_batch(owner, &uploads)?;
    print_batch(&batch);

    println!();
    println!(
        "📊 {} ingested, {} skipped, {} failed ({} read → {} kept)",
        batch.ingested(),
        batch.skipped(),
        batch.failed(),
        batch.total_read,
        batch.total_inserted
    );

    println!();
    println!("Records per period:");
    print_period_counts(&pipeline.period_counts(owner)?);

    Ok(())
}

pub fn cmd_reprocess(
    db: &Database,
    objects: &LocalObjectStore,
    config: &Config,
    owner: &str,
) -> Result<()> {
    println!("🔄 Reprocessing stored files for {}...", owner);

    let pipeline = Pipeline::new(db, objects, config.ingest.clone());
    let report = pipeline.reprocess_all(owner)?;

    println!("   Cleared {} records", report.cleared);
    print_batch(&report.batch);

    println!();
    println!(
        "✅ {} files reprocessed, {} records stored",
        report.batch.ingested(),
        report.batch.total_inserted
    );

    Ok(())
}
