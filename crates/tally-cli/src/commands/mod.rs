//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config, require_owner)
//! - `files` - Uploaded file commands (list, delete)
//! - `status` - Status command
//! - `summary` - Fact sheet and assistant prompt commands
//! - `upload` - Preview, upload and reprocess commands

pub mod core;
pub mod files;
pub mod status;
pub mod summary;
pub mod upload;

// Re-export command functions for main.rs
pub use core::*;
pub use files::*;
pub use status::*;
pub use summary::*;
pub use upload::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
