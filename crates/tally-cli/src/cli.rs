//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Monthly sales spreadsheets in, structured facts out
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Ingest monthly sales spreadsheets and summarize them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the per-user override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Owner whose files and records the command acts on
    #[arg(long, env = "TALLY_OWNER", global = true)]
    pub owner: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and storage directory
    Init,

    /// Parse a spreadsheet without storing anything
    Preview {
        /// Spreadsheet to parse (name must contain month and year)
        file: PathBuf,

        /// Print the parse result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload spreadsheets and ingest their rows
    Upload {
        /// Files to upload, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List uploaded files
    Files,

    /// Delete an uploaded file and its records
    Delete {
        /// Storage key as shown by `tally files`
        key: String,
    },

    /// Rebuild all records from the stored files
    Reprocess,

    /// Print the fact sheet
    Summary,

    /// Print the assistant prompt for a question
    Ask {
        /// Question about the uploaded sales
        question: String,
    },

    /// Show database status and record counts per period
    Status,
}
