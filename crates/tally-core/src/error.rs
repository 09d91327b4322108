//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The filename carries no recognizable month (or year) token
    #[error(
        "Could not detect the period in file name \"{filename}\": {reason}. \
         The name must contain a month and a year (e.g. \"Janeiro 2025.xlsx\", \
         \"Fevereiro-2025.xlsx\", \"marco_2025.csv\")"
    )]
    PeriodNotFound { filename: String, reason: String },

    /// The bytes are not decodable as any supported tabular format
    #[error("Unreadable file \"{filename}\": {reason}")]
    UnreadableFile { filename: String, reason: String },

    /// The source file key belongs to another owner
    #[error("Forbidden: file {key} belongs to another user")]
    Forbidden { key: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A chunk insert failed part-way through an ingestion
    #[error(
        "Insert failed on chunk {chunk} after {inserted} of {received} records \
         (rolled back: {rolled_back}): {message}"
    )]
    ChunkInsert {
        chunk: usize,
        inserted: usize,
        received: usize,
        rolled_back: bool,
        message: String,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
