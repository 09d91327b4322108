//! Storage seams used by ingestion and the upload pipeline
//!
//! - `RecordWriter` / `RecordStore` persist sales records
//! - `FileRegistry` tracks which owner uploaded which file
//!
//! `Database` implements all of them on SQLite; `test_utils::MemoryStore`
//! implements them in memory with failure injection.

use crate::error::Result;
use crate::models::{NewSale, NewUploadedFile, PeriodCount, SalesRecord, SourceFile, UploadedFile};

/// Equality filter over stored records. `owner` is always required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub owner: String,
    pub source_file_key: Option<String>,
}

impl RecordFilter {
    /// Every record of one owner
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            source_file_key: None,
        }
    }

    /// Records of one owner that came from one uploaded file
    pub fn file(owner: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            source_file_key: Some(key.into()),
        }
    }
}

/// Write side of a record store
pub trait RecordWriter {
    /// Insert `records` for `owner`, tagged with `source`. All or nothing;
    /// returns the number of rows written.
    fn insert(&self, owner: &str, source: &SourceFile, records: &[NewSale]) -> Result<usize>;

    /// Delete matching records, returning how many were removed
    fn delete(&self, filter: &RecordFilter) -> Result<usize>;
}

/// A queryable record store with transactions
pub trait RecordStore: RecordWriter {
    /// Matching records in insertion order
    fn select(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>>;

    /// Stored record count per period, oldest period first
    fn count_by_period(&self, owner: &str) -> Result<Vec<PeriodCount>>;

    /// Run `f` against a writer scoped to one transaction.
    ///
    /// Commits when `f` returns `Ok`; anything else (an `Err`, a panic)
    /// leaves the store as it was before the call.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn RecordWriter) -> Result<T>;
}

/// Registry of uploaded files and their owners
pub trait FileRegistry {
    /// Owner of `key`, or `None` when the key was never registered
    fn owner_of(&self, key: &str) -> Result<Option<String>>;

    /// Register a file, replacing the metadata of an existing entry for the
    /// same key and owner. Returns the entry id.
    fn register(&self, file: &NewUploadedFile) -> Result<i64>;

    /// Files of one owner, most recent first
    fn list_files(&self, owner: &str) -> Result<Vec<UploadedFile>>;

    /// Remove an entry, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool>;
}
