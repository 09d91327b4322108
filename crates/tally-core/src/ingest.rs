//! Ingestion service
//!
//! Persists a parsed batch for one owner and one uploaded file. Re-ingesting
//! a file key first deletes every record previously stored under it, so a
//! re-upload never accumulates duplicates. A batch with no valid record
//! changes nothing.
//!
//! With `atomic_replace` the delete and every chunk run in one transaction:
//! a failing chunk leaves the previous records untouched. Without it each
//! chunk commits on its own and a failure reports how many rows stand.

use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::import::YEAR_RANGE;
use crate::models::{IngestReport, NewSale, SourceFile};
use crate::storage::validate_key;
use crate::store::{FileRegistry, RecordFilter, RecordStore, RecordWriter};

pub const MAX_PRODUCT_CHARS: usize = 200;
pub const MAX_DESCRIPTIVE_CHARS: usize = 100;
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Check one record against storage limits
pub fn sanitize(sale: &NewSale) -> std::result::Result<(), String> {
    let product_len = sale.product.trim().chars().count();
    if product_len == 0 || product_len > MAX_PRODUCT_CHARS {
        return Err(format!(
            "product must be 1 to {} characters",
            MAX_PRODUCT_CHARS
        ));
    }
    if !(0..=MAX_QUANTITY).contains(&sale.quantity) {
        return Err(format!("quantity {} outside 0..={}", sale.quantity, MAX_QUANTITY));
    }
    if !YEAR_RANGE.contains(&sale.year) {
        return Err(format!("year {} outside 2000..=2100", sale.year));
    }
    for (label, amount) in [
        ("unit price", sale.unit_price),
        ("total revenue", sale.total_revenue),
    ] {
        if let Some(v) = amount {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} {} is not a non-negative number", label, v));
            }
        }
    }
    for (label, text) in [
        ("transaction id", &sale.transaction_id),
        ("category", &sale.category),
        ("region", &sale.region),
    ] {
        if text.as_ref().is_some_and(|t| t.chars().count() > MAX_DESCRIPTIVE_CHARS) {
            return Err(format!(
                "{} longer than {} characters",
                label, MAX_DESCRIPTIVE_CHARS
            ));
        }
    }
    Ok(())
}

/// Validates and persists parsed batches
pub struct IngestionService<'a, S> {
    store: &'a S,
    config: IngestConfig,
}

impl<'a, S: RecordStore + FileRegistry> IngestionService<'a, S> {
    pub fn new(store: &'a S, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Replace the records stored for `source` with `records`.
    ///
    /// The file must already be registered to `owner`: an unknown key is
    /// `NotFound`, a key of another owner is `Forbidden`. Neither touches the
    /// store.
    pub fn ingest(
        &self,
        owner: &str,
        source: &SourceFile,
        records: &[NewSale],
    ) -> Result<IngestReport> {
        if owner.trim().is_empty() {
            return Err(Error::InvalidData("owner is required".into()));
        }
        validate_key(&source.key)?;

        match self.store.owner_of(&source.key)? {
            None => return Err(Error::NotFound(format!("File {}", source.key))),
            Some(registered) if registered != owner => {
                warn!(owner, key = %source.key, "Rejected ingestion for another owner's file");
                return Err(Error::Forbidden {
                    key: source.key.clone(),
                });
            }
            Some(_) => {}
        }

        let received = records.len();
        if received > self.config.max_records {
            return Err(Error::InvalidData(format!(
                "{} records exceed the limit of {} per file",
                received, self.config.max_records
            )));
        }

        let accepted: Vec<NewSale> = records
            .iter()
            .enumerate()
            .filter_map(|(idx, sale)| match sanitize(sale) {
                Ok(()) => Some(sale.clone()),
                Err(reason) => {
                    warn!(key = %source.key, record = idx + 1, %reason, "Dropping record");
                    None
                }
            })
            .collect();

        let mut report = IngestReport {
            received,
            accepted: accepted.len(),
            rejected: received - accepted.len(),
            ..Default::default()
        };

        if accepted.is_empty() {
            warn!(
                owner,
                key = %source.key,
                received,
                "No valid records, previous records left in place"
            );
            return Ok(report);
        }

        let filter = RecordFilter::file(owner, &source.key);
        let (deleted, inserted) = if self.config.atomic_replace {
            self.store.transaction(|writer| {
                let deleted = writer.delete(&filter)?;
                let inserted = self.insert_chunks(writer, owner, source, &accepted, received, true)?;
                Ok((deleted, inserted))
            })?
        } else {
            let deleted = match self.store.delete(&filter) {
                Ok(n) => n,
                Err(e) => {
                    warn!(owner, key = %source.key, error = %e, "Failed to delete previous records");
                    0
                }
            };
            let inserted =
                self.insert_chunks(self.store, owner, source, &accepted, received, false)?;
            (deleted, inserted)
        };

        report.deleted = deleted;
        report.inserted = inserted;
        info!(
            owner,
            key = %source.key,
            received = report.received,
            rejected = report.rejected,
            deleted,
            inserted,
            "Ingested file"
        );
        Ok(report)
    }

    fn insert_chunks(
        &self,
        writer: &dyn RecordWriter,
        owner: &str,
        source: &SourceFile,
        records: &[NewSale],
        received: usize,
        rolled_back: bool,
    ) -> Result<usize> {
        let mut inserted = 0;
        for (chunk, batch) in records.chunks(self.config.chunk_size).enumerate() {
            match writer.insert(owner, source, batch) {
                Ok(n) => {
                    inserted += n;
                    debug!(key = %source.key, chunk, rows = n, "Inserted chunk");
                }
                Err(e) => {
                    warn!(key = %source.key, chunk, inserted, error = %e, "Chunk insert failed");
                    return Err(Error::ChunkInsert {
                        chunk,
                        inserted,
                        received,
                        rolled_back,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(inserted)
    }
}
