//! Month/year extraction from uploaded file names
//!
//! Monthly exports are named after their period ("Fevereiro-2025.xlsx",
//! "vendas marco_2025.csv"). The period is taken from the name only, never
//! from a date column inside the file.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Month, Period};
use crate::normalize::fold_text;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2}|19\d{2})").expect("valid regex"));

const SPREADSHEET_EXTENSIONS: [&str; 4] = [".xlsx", ".xls", ".csv", ".ods"];

/// Extract the period from a file name. The year is required.
pub fn extract_period(filename: &str) -> Result<Period> {
    extract_period_with_fallback(filename, None)
}

/// Extract the period, using `fallback_year` when the name has no year.
///
/// A missing month is always an error.
pub fn extract_period_with_fallback(filename: &str, fallback_year: Option<i32>) -> Result<Period> {
    let stem = strip_extension(base_name(filename));
    let norm = fold_text(stem);
    debug!(filename, normalized = %norm, "Extracting period from file name");

    // Canonical order, not position in the name, decides ambiguous names
    let month = Month::ALL
        .iter()
        .copied()
        .find(|m| norm.contains(&fold_text(m.as_str())))
        .ok_or_else(|| Error::PeriodNotFound {
            filename: filename.to_string(),
            reason: format!(
                "no month name found (expected one of: {})",
                Month::ALL.map(|m| m.as_str()).join(", ")
            ),
        })?;

    let year = match YEAR_RE.find(&norm) {
        Some(m) => m.as_str().parse::<i32>().map_err(|e| Error::PeriodNotFound {
            filename: filename.to_string(),
            reason: format!("invalid year: {}", e),
        })?,
        None => fallback_year.ok_or_else(|| Error::PeriodNotFound {
            filename: filename.to_string(),
            reason: "no 4-digit year found".to_string(),
        })?,
    };

    debug!(filename, %month, year, "Period detected");
    Ok(Period::new(month, year))
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

fn strip_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    SPREADSHEET_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &name[..name.len() - ext.len()])
        .unwrap_or(name)
}
