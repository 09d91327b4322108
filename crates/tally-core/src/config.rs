//! Runtime configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path (`--config`), else the override in the data dir
//!    (~/.local/share/tally/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default value.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::import::ParseOptions;
use crate::storage::default_storage_dir;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Records per insert batch
    pub chunk_size: usize,
    /// Largest batch accepted in one ingestion call
    pub max_records: usize,
    /// Replace a file's records inside one transaction
    pub atomic_replace: bool,
    pub fallback_to_current_year: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_records: 10_000,
            atomic_replace: true,
            fallback_to_current_year: false,
        }
    }
}

impl IngestConfig {
    /// Parser options implied by this config
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            fallback_year: self
                .fallback_to_current_year
                .then(|| chrono::Utc::now().year()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Character budget for the fact sheet in an assistant prompt
    pub max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_chars: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Where uploaded bytes are kept
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub ingest: IngestConfig,
    pub context: ContextConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load with the standard resolution order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let content = match explicit {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config(&path)?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };
        parse_config(&content)
    }

    /// The embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Reading config");
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ingest: Option<RawIngest>,
    context: Option<RawContext>,
    storage: Option<RawStorage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIngest {
    chunk_size: Option<usize>,
    max_records: Option<usize>,
    atomic_replace: Option<bool>,
    fallback_to_current_year: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContext {
    max_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStorage {
    dir: Option<PathBuf>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(ingest) = raw.ingest {
        if let Some(chunk_size) = ingest.chunk_size {
            config.ingest.chunk_size = chunk_size;
        }
        if let Some(max_records) = ingest.max_records {
            config.ingest.max_records = max_records;
        }
        if let Some(atomic) = ingest.atomic_replace {
            config.ingest.atomic_replace = atomic;
        }
        if let Some(fallback) = ingest.fallback_to_current_year {
            config.ingest.fallback_to_current_year = fallback;
        }
    }

    if let Some(context) = raw.context {
        if let Some(max_chars) = context.max_chars {
            config.context.max_chars = max_chars;
        }
    }

    if let Some(dir) = raw.storage.and_then(|s| s.dir) {
        config.storage.dir = dir;
    }

    if config.ingest.chunk_size == 0 {
        return Err(Error::Config("ingest.chunk_size must be at least 1".into()));
    }
    if config.ingest.max_records == 0 {
        return Err(Error::Config("ingest.max_records must be at least 1".into()));
    }
    if config.context.max_chars == 0 {
        return Err(Error::Config("context.max_chars must be at least 1".into()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(config.ingest.max_records, 10_000);
        assert!(config.ingest.atomic_replace);
        assert!(!config.ingest.fallback_to_current_year);
        assert_eq!(config.context.max_chars, 10_000);
        assert_eq!(config.storage.dir, default_storage_dir());
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config("[ingest]\nchunk_size = 50\n").unwrap();
        assert_eq!(config.ingest.chunk_size, 50);
        assert_eq!(config.ingest.max_records, 10_000);
        assert_eq!(config.context.max_chars, 10_000);
    }

    #[test]
    fn test_storage_dir_override() {
        let config = parse_config("[storage]\ndir = \"/srv/tally\"\n").unwrap();
        assert_eq!(config.storage.dir, PathBuf::from("/srv/tally"));
    }

    #[test]
    fn test_zero_values_rejected() {
        for content in [
            "[ingest]\nchunk_size = 0\n",
            "[ingest]\nmax_records = 0\n",
            "[context]\nmax_chars = 0\n",
        ] {
            assert!(matches!(parse_config(content), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(parse_config("[ingest"), Err(Error::Config(_))));
        assert!(matches!(
            parse_config("[ingest]\nchunk = 1\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_fallback_year_option() {
        let mut ingest = IngestConfig::default();
        assert_eq!(ingest.parse_options().fallback_year, None);
        ingest.fallback_to_current_year = true;
        assert!(ingest.parse_options().fallback_year.is_some());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        fs::write(&path, "[context]\nmax_chars = 2000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.context.max_chars, 2000);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));
    }
}
