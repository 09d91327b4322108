//! Object storage for uploaded spreadsheet bytes
//!
//! # Architecture
//!
//! - `ObjectStore` trait defines the interface for storage backends
//! - `LocalObjectStore` keeps objects under a local directory
//!
//! Keys are `/`-separated relative paths. Uploads use the deterministic key
//! `<owner>/<sanitized filename>`, so uploading the same file name again
//! replaces both the stored bytes and the records ingested from it. A name
//! that sanitizing had to change also carries a short digest of the original,
//! so two different names never share a key.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::normalize::strip_diacritics;

mod local;

pub use local::LocalObjectStore;

/// Longest accepted object key
pub const MAX_KEY_LEN: usize = 500;

/// Information about a stored object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Trait for object storage backends
pub trait ObjectStore: Send + Sync {
    /// Human-readable name for this backend
    fn name(&self) -> &str;

    /// Store `bytes` under `key`, overwriting any existing object
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch an object. Missing keys are `Error::NotFound`.
    fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Objects whose key starts with `prefix`, sorted by key
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Delete an object, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool>;
}

/// Whether `c` may appear in an object key
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ' | '/')
}

/// Check a key is a safe relative path made of allowed characters
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidData(format!(
            "File key must be 1 to {} characters",
            MAX_KEY_LEN
        )));
    }
    if let Some(c) = key.chars().find(|c| !is_key_char(*c)) {
        return Err(Error::InvalidData(format!(
            "File key \"{}\" contains invalid character {:?}",
            key, c
        )));
    }
    if key
        .split('/')
        .any(|part| part.trim().is_empty() || part == "." || part == "..")
    {
        return Err(Error::InvalidData(format!(
            "File key \"{}\" has an empty or relative path segment",
            key
        )));
    }
    Ok(())
}

/// Make a user-supplied file name safe for use as a key segment.
///
/// Accents are stripped ("Março" -> "Marco"), directories dropped and any
/// other disallowed character replaced with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = strip_diacritics(base_name(filename))
        .chars()
        .map(|c| if is_key_char(c) && c != '/' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

/// Deterministic key for an owner's upload
pub fn storage_key(owner: &str, filename: &str) -> String {
    let base = base_name(filename);
    let cleaned = sanitize_filename(filename);
    if cleaned == base {
        return format!("{}/{}", owner, cleaned);
    }

    let digest = hex::encode(Sha256::digest(base.as_bytes()));
    let tag = &digest[..8];
    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}/{}-{}.{}", owner, stem, tag, ext),
        _ => format!("{}/{}-{}", owner, cleaned, tag),
    }
}

/// Default object directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("files")
}
