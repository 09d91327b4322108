//! Test utilities for tally-core
//!
//! `MemoryStore` implements the storage traits in memory and can be told to
//! fail specific calls, which the SQLite store cannot easily be made to do.
//! The builders produce records and CSV fixtures without touching disk.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{
    Month, NewSale, NewUploadedFile, Period, PeriodCount, SalesRecord, SourceFile, UploadedFile,
};
use crate::store::{FileRegistry, RecordFilter, RecordStore, RecordWriter};

#[derive(Debug, Clone, Default)]
struct State {
    records: Vec<SalesRecord>,
    files: Vec<UploadedFile>,
    next_id: i64,
}

/// In-memory `RecordStore` + `FileRegistry` with failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    insert_calls: AtomicUsize,
    /// 1-based insert call that fails (0 = never)
    fail_insert_on: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `insert` calls so far, failed ones included
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Make the `n`th insert call (counting from 1 since creation) fail
    pub fn fail_insert_on_call(&self, n: usize) {
        self.fail_insert_on.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn matches(record: &SalesRecord, filter: &RecordFilter) -> bool {
        record.owner == filter.owner
            && filter
                .source_file_key
                .as_ref()
                .map_or(true, |key| &record.source_file_key == key)
    }
}

impl RecordWriter for MemoryStore {
    fn insert(&self, owner: &str, source: &SourceFile, records: &[NewSale]) -> Result<usize> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_insert_on.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("injected failure on insert {}", call)));
        }

        let mut state = self.lock();
        for sale in records {
            state.next_id += 1;
            let id = state.next_id;
            state.records.push(SalesRecord {
                id,
                owner: owner.to_string(),
                product: sale.product.clone(),
                quantity: sale.quantity,
                unit_price: sale.unit_price,
                total_revenue: sale.total_revenue,
                month: sale.month,
                year: sale.year,
                transaction_date: sale.transaction_date,
                transaction_id: sale.transaction_id.clone(),
                category: sale.category.clone(),
                region: sale.region.clone(),
                source_filename: source.filename.clone(),
                source_file_key: source.key.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(records.len())
    }

    fn delete(&self, filter: &RecordFilter) -> Result<usize> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected delete failure".into()));
        }
        let mut state = self.lock();
        let before = state.records.len();
        state.records.retain(|r| !Self::matches(r, filter));
        Ok(before - state.records.len())
    }
}

/// Restores the snapshot on drop unless disarmed
struct Rollback<'a> {
    store: &'a MemoryStore,
    snapshot: Option<State>,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.store.lock() = snapshot;
        }
    }
}

impl RecordStore for MemoryStore {
    fn select(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| Self::matches(r, filter))
            .cloned()
            .collect())
    }

    fn count_by_period(&self, owner: &str) -> Result<Vec<PeriodCount>> {
        let mut counts: Vec<PeriodCount> = Vec::new();
        for record in self.lock().records.iter().filter(|r| r.owner == owner) {
            let period = record.period();
            match counts.iter_mut().find(|c| c.period == period) {
                Some(c) => c.records += 1,
                None => counts.push(PeriodCount { period, records: 1 }),
            }
        }
        counts.sort_by_key(|c| (c.period.year, c.period.month));
        Ok(counts)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn RecordWriter) -> Result<T>,
    {
        let mut guard = Rollback {
            store: self,
            snapshot: Some(self.lock().clone()),
        };
        let value = f(self)?;
        guard.snapshot = None;
        Ok(value)
    }
}

impl FileRegistry for MemoryStore {
    fn owner_of(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .files
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.owner.clone()))
    }

    fn register(&self, file: &NewUploadedFile) -> Result<i64> {
        let mut state = self.lock();
        if let Some(existing) = state.files.iter_mut().find(|f| f.key == file.key) {
            if existing.owner != file.owner {
                return Err(Error::Forbidden {
                    key: file.key.clone(),
                });
            }
            existing.filename = file.filename.clone();
            existing.size_bytes = file.size_bytes;
            existing.content_type = file.content_type.clone();
            existing.sha256 = file.sha256.clone();
            existing.created_at = Utc::now();
            return Ok(existing.id);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.files.push(UploadedFile {
            id,
            key: file.key.clone(),
            owner: file.owner.clone(),
            filename: file.filename.clone(),
            size_bytes: file.size_bytes,
            content_type: file.content_type.clone(),
            sha256: file.sha256.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn list_files(&self, owner: &str) -> Result<Vec<UploadedFile>> {
        let mut files: Vec<UploadedFile> = self
            .lock()
            .files
            .iter()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect();
        files.reverse();
        Ok(files)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.lock();
        let before = state.files.len();
        state.files.retain(|f| f.key != key);
        Ok(state.files.len() < before)
    }
}

/// Register `key` to `owner` with placeholder metadata
pub fn register<R: FileRegistry>(registry: &R, owner: &str, key: &str) -> i64 {
    registry
        .register(&NewUploadedFile {
            key: key.to_string(),
            owner: owner.to_string(),
            filename: key.rsplit('/').next().unwrap_or(key).to_string(),
            size_bytes: 0,
            content_type: None,
            sha256: None,
        })
        .expect("register test file")
}

/// A Janeiro/2025 record with only the required fields
pub fn sample_sale(product: &str, quantity: i64) -> NewSale {
    sale_in(product, quantity, Period::new(Month::Janeiro, 2025))
}

/// A record in a given period
pub fn sale_in(product: &str, quantity: i64, period: Period) -> NewSale {
    NewSale {
        product: product.to_string(),
        quantity,
        unit_price: None,
        total_revenue: None,
        month: period.month,
        year: period.year,
        transaction_date: None,
        transaction_id: None,
        category: None,
        region: None,
        source_filename: format!("{} {}.csv", period.month, period.year),
    }
}

/// `n` distinct Janeiro/2025 records
pub fn sample_sales(n: usize) -> Vec<NewSale> {
    (0..n)
        .map(|i| sample_sale(&format!("Produto {}", i), (i % 50) as i64 + 1))
        .collect()
}

/// CSV bytes for a header row plus data rows
pub fn csv_fixture(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(headers).expect("write header");
    for row in rows {
        wtr.write_record(*row).expect("write row");
    }
    wtr.into_inner().expect("flush csv")
}
