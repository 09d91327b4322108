//! Tally Core Library
//!
//! Shared functionality for the Tally sales spreadsheet tool:
//! - Period detection from file names
//! - Column normalization and row coercion
//! - CSV and workbook parsing
//! - Idempotent, owner-scoped ingestion into SQLite
//! - Object storage for uploaded files
//! - Deterministic fact-sheet aggregation and assistant context

pub mod aggregate;
pub mod coerce;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod import;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod storage;
pub mod store;

/// Test utilities including an in-memory store with failure injection
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{summarize, FactSheet, PeriodSummary, ProductTotal, NO_DATA_MARKER};
pub use config::{Config, ContextConfig, IngestConfig, StorageConfig};
pub use context::{AssistantContext, ContextAssembler};
pub use db::Database;
pub use error::{Error, Result};
pub use import::{parse_spreadsheet, parse_spreadsheet_with, ParseOptions, SheetFormat};
pub use ingest::IngestionService;
pub use models::{
    Cell, IngestReport, Month, NewSale, NewUploadedFile, ParseResult, Period, PeriodCount,
    RowRejection, SalesRecord, SourceFile, UploadedFile,
};
pub use period::extract_period;
pub use pipeline::{BatchReport, DeleteReport, FileOutcome, Pipeline, ReprocessReport, Upload};
pub use storage::{storage_key, LocalObjectStore, ObjectInfo, ObjectStore};
pub use store::{FileRegistry, RecordFilter, RecordStore, RecordWriter};
