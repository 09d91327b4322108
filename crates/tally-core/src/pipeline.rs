//! Upload pipeline
//!
//! Ties parsing, object storage, the file registry and ingestion together
//! for the user-facing flows: uploading a batch of files, reprocessing
//! everything already uploaded, and deleting one file.
//!
//! Files in a batch are handled strictly one after another. A file that
//! fails is reported and the batch moves on to the next one.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::import::{parse_spreadsheet_with, ParseOptions};
use crate::ingest::IngestionService;
use crate::models::{IngestReport, NewUploadedFile, Period, PeriodCount, SourceFile};
use crate::storage::{is_key_char, storage_key, ObjectStore};
use crate::store::{FileRegistry, RecordFilter, RecordStore};

pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".csv", ".xlsx", ".xls", ".ods"];

/// One file handed to the pipeline
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// What happened to one file of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Ingested {
        filename: String,
        key: String,
        period: Period,
        read: usize,
        report: IngestReport,
        warnings: Vec<String>,
    },
    /// Not an error, but nothing was stored
    Skipped { filename: String, reason: String },
    Failed { filename: String, reason: String },
}

impl FileOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Ingested { filename, .. }
            | Self::Skipped { filename, .. }
            | Self::Failed { filename, .. } => filename,
        }
    }

    /// One line for a per-file notification
    pub fn summary_line(&self) -> String {
        match self {
            Self::Ingested {
                filename,
                period,
                read,
                report,
                ..
            } => format!(
                "{} ({}): {} read → {} kept",
                filename, period, read, report.inserted
            ),
            Self::Skipped { filename, reason } => format!("{}: skipped, {}", filename, reason),
            Self::Failed { filename, reason } => format!("{}: failed, {}", filename, reason),
        }
    }
}

/// Result of a batch upload or a reprocess run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    /// Data rows read across all files
    pub total_read: usize,
    /// Records stored across all files
    pub total_inserted: usize,
}

impl BatchReport {
    fn push(&mut self, outcome: FileOutcome) {
        if let FileOutcome::Ingested { read, report, .. } = &outcome {
            self.total_read += read;
            self.total_inserted += report.inserted;
        }
        self.outcomes.push(outcome);
    }

    pub fn ingested(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Ingested { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes.iter().map(FileOutcome::summary_line).collect()
    }
}

/// Result of [`Pipeline::reprocess_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReprocessReport {
    /// Records removed before re-ingesting
    pub cleared: usize,
    pub batch: BatchReport,
}

/// Result of [`Pipeline::delete_file`]
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub key: String,
    pub records_deleted: usize,
    pub object_deleted: bool,
}

/// Owners become the first key segment, so they use the key alphabet minus `/`
pub fn validate_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(Error::InvalidData("owner is required".into()));
    }
    if owner.chars().any(|c| c == '/' || !is_key_char(c)) {
        return Err(Error::InvalidData(format!(
            "owner \"{}\" may only use letters, digits, space, '_', '-' and '.'",
            owner
        )));
    }
    Ok(())
}

pub fn is_supported(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn content_type(filename: &str) -> Option<String> {
    let lower = filename.to_ascii_lowercase();
    let mime = if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else if lower.ends_with(".xls") {
        "application/vnd.ms-excel"
    } else if lower.ends_with(".ods") {
        "application/vnd.oasis.opendocument.spreadsheet"
    } else {
        return None;
    };
    Some(mime.to_string())
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Upload, reprocess and delete flows over the storage seams
pub struct Pipeline<'a, S, O: ?Sized> {
    store: &'a S,
    objects: &'a O,
    config: IngestConfig,
    parse_options: ParseOptions,
}

impl<'a, S, O> Pipeline<'a, S, O>
where
    S: RecordStore + FileRegistry,
    O: ObjectStore + ?Sized,
{
    pub fn new(store: &'a S, objects: &'a O, config: IngestConfig) -> Self {
        let parse_options = config.parse_options();
        Self {
            store,
            objects,
            config,
            parse_options,
        }
    }

    fn ingestion(&self) -> IngestionService<'a, S> {
        IngestionService::new(self.store, self.config.clone())
    }

    /// Process `uploads` in order for `owner`
    pub fn upload_batch(&self, owner: &str, uploads: &[Upload]) -> Result<BatchReport> {
        validate_owner(owner)?;

        let mut batch = BatchReport::default();
        for upload in uploads {
            let outcome = self.upload_one(owner, upload).unwrap_or_else(|e| {
                warn!(owner, filename = %upload.filename, error = %e, "File failed");
                FileOutcome::Failed {
                    filename: upload.filename.clone(),
                    reason: e.to_string(),
                }
            });
            info!("{}", outcome.summary_line());
            batch.push(outcome);
        }

        info!(
            owner,
            files = uploads.len(),
            ingested = batch.ingested(),
            failed = batch.failed(),
            total_inserted = batch.total_inserted,
            "Upload batch finished"
        );
        Ok(batch)
    }

    fn upload_one(&self, owner: &str, upload: &Upload) -> Result<FileOutcome> {
        let filename = upload.filename.as_str();
        if !is_supported(filename) {
            warn!(filename, "Unsupported file type");
            return Ok(FileOutcome::Skipped {
                filename: filename.to_string(),
                reason: format!(
                    "unsupported file type (expected {})",
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            });
        }

        let parsed = parse_spreadsheet_with(&upload.bytes, filename, &self.parse_options)?;
        if parsed.records.is_empty() {
            warn!(filename, read = parsed.read, "No valid rows, file not stored");
            return Ok(FileOutcome::Skipped {
                filename: filename.to_string(),
                reason: format!("no valid rows ({} read)", parsed.read),
            });
        }

        let key = storage_key(owner, filename);
        self.objects.upload(&key, &upload.bytes)?;
        self.store.register(&NewUploadedFile {
            key: key.clone(),
            owner: owner.to_string(),
            filename: filename.to_string(),
            size_bytes: upload.bytes.len() as i64,
            content_type: content_type(filename),
            sha256: Some(sha256_hex(&upload.bytes)),
        })?;

        let report = self
            .ingestion()
            .ingest(owner, &SourceFile::new(&key, filename), &parsed.records)?;

        Ok(FileOutcome::Ingested {
            filename: filename.to_string(),
            key,
            period: parsed.period,
            read: parsed.read,
            report,
            warnings: parsed.warnings,
        })
    }

    /// Drop every record of `owner` and rebuild them from the stored files
    pub fn reprocess_all(&self, owner: &str) -> Result<ReprocessReport> {
        validate_owner(owner)?;

        let cleared = self.store.delete(&RecordFilter::owner(owner))?;
        let files = self.store.list_files(owner)?;
        info!(owner, cleared, files = files.len(), "Reprocessing stored files");

        let mut batch = BatchReport::default();
        for file in files {
            let outcome = self
                .reprocess_one(owner, &file.key, &file.filename)
                .unwrap_or_else(|e| {
                    warn!(owner, key = %file.key, error = %e, "Reprocessing failed");
                    FileOutcome::Failed {
                        filename: file.filename.clone(),
                        reason: e.to_string(),
                    }
                });
            batch.push(outcome);
        }

        Ok(ReprocessReport { cleared, batch })
    }

    fn reprocess_one(&self, owner: &str, key: &str, filename: &str) -> Result<FileOutcome> {
        let bytes = self.objects.download(key)?;
        let parsed = parse_spreadsheet_with(&bytes, filename, &self.parse_options)?;
        if parsed.records.is_empty() {
            return Ok(FileOutcome::Skipped {
                filename: filename.to_string(),
                reason: format!("no valid rows ({} read)", parsed.read),
            });
        }

        let report = self
            .ingestion()
            .ingest(owner, &SourceFile::new(key, filename), &parsed.records)?;

        Ok(FileOutcome::Ingested {
            filename: filename.to_string(),
            key: key.to_string(),
            period: parsed.period,
            read: parsed.read,
            report,
            warnings: parsed.warnings,
        })
    }

    /// Remove one uploaded file: its records, its bytes and its registry entry
    pub fn delete_file(&self, owner: &str, key: &str) -> Result<DeleteReport> {
        match self.store.owner_of(key)? {
            None => return Err(Error::NotFound(format!("File {}", key))),
            Some(registered) if registered != owner => {
                return Err(Error::Forbidden {
                    key: key.to_string(),
                })
            }
            Some(_) => {}
        }

        let records_deleted = self.store.delete(&RecordFilter::file(owner, key))?;
        let object_deleted = self.objects.delete(key)?;
        if !object_deleted {
            warn!(key, "Stored bytes were already gone");
        }
        self.store.remove(key)?;

        info!(owner, key, records_deleted, "Deleted file");
        Ok(DeleteReport {
            key: key.to_string(),
            records_deleted,
            object_deleted,
        })
    }

    /// Stored record count per period
    pub fn period_counts(&self, owner: &str) -> Result<Vec<PeriodCount>> {
        self.store.count_by_period(owner)
    }
}
