//! Domain models for Tally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::fold_text;

/// Canonical month names. The period of a record always comes from the
/// uploaded file's name, never from a data column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Month {
    Janeiro,
    Fevereiro,
    #[serde(rename = "Março")]
    Marco,
    Abril,
    Maio,
    Junho,
    Julho,
    Agosto,
    Setembro,
    Outubro,
    Novembro,
    Dezembro,
}

impl Month {
    /// All months in canonical (calendar) order
    pub const ALL: [Month; 12] = [
        Self::Janeiro,
        Self::Fevereiro,
        Self::Marco,
        Self::Abril,
        Self::Maio,
        Self::Junho,
        Self::Julho,
        Self::Agosto,
        Self::Setembro,
        Self::Outubro,
        Self::Novembro,
        Self::Dezembro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Janeiro => "Janeiro",
            Self::Fevereiro => "Fevereiro",
            Self::Marco => "Março",
            Self::Abril => "Abril",
            Self::Maio => "Maio",
            Self::Junho => "Junho",
            Self::Julho => "Julho",
            Self::Agosto => "Agosto",
            Self::Setembro => "Setembro",
            Self::Outubro => "Outubro",
            Self::Novembro => "Novembro",
            Self::Dezembro => "Dezembro",
        }
    }

    /// Calendar number, 1 = Janeiro
    pub fn number(&self) -> u32 {
        Self::ALL
            .iter()
            .position(|m| m == self)
            .map(|i| i as u32 + 1)
            .unwrap_or(1)
    }
}

impl std::str::FromStr for Month {
    type Err = String;

    /// Accepts the canonical name in any casing, with or without accents
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let folded = fold_text(s.trim());
        Self::ALL
            .iter()
            .copied()
            .find(|m| fold_text(m.as_str()) == folded)
            .ok_or_else(|| format!("Unknown month: {}", s))
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A (month, year) aggregation bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub month: Month,
    pub year: i32,
}

impl Period {
    pub fn new(month: Month, year: i32) -> Self {
        Self { month, year }
    }
}

/// Renders as the `"month/year"` grouping key, e.g. `Março/2025`
impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

/// A single spreadsheet cell as read from the file, before coercion.
///
/// Missing cells are `Empty` so every row has the same shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date (days since 1899-12-30)
    DateTime(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text form of the cell, trimmed. Whole floats render without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) | Self::DateTime(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// A sales line item produced by the parser, not yet owned by anyone.
///
/// Ownership and the source file key are attached by ingestion only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub product: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    pub total_revenue: Option<f64>,
    pub month: Month,
    pub year: i32,
    /// Derived from a date column, informational only
    pub transaction_date: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub source_filename: String,
}

impl NewSale {
    pub fn period(&self) -> Period {
        Period::new(self.month, self.year)
    }
}

/// A persisted sales record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: i64,
    pub owner: String,
    pub product: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    pub total_revenue: Option<f64>,
    pub month: Month,
    pub year: i32,
    pub transaction_date: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub source_filename: String,
    pub source_file_key: String,
    pub created_at: DateTime<Utc>,
}

impl SalesRecord {
    pub fn period(&self) -> Period {
        Period::new(self.month, self.year)
    }
}

/// Why a row was dropped during coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingProduct,
    MissingQuantity,
    InvalidQuantity,
    NegativeQuantity,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingProduct => "product is empty",
            Self::MissingQuantity => "quantity is empty",
            Self::InvalidQuantity => "quantity is not a number",
            Self::NegativeQuantity => "quantity is negative",
        }
    }
}

/// A row that failed required-field checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based row below the header, counting blank rows
    pub row: usize,
    pub reason: RejectReason,
    pub product: String,
    pub quantity: String,
}

impl std::fmt::Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Row {} skipped: {} (product=\"{}\", quantity=\"{}\")",
            self.row,
            self.reason.as_str(),
            self.product,
            self.quantity
        )
    }
}

/// Outcome of parsing one spreadsheet
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    pub period: Period,
    /// Accepted records, in row order
    pub records: Vec<NewSale>,
    /// Raw data rows read, before validation
    pub read: usize,
    /// First records for preview
    pub sample: Vec<NewSale>,
    pub rejections: Vec<RowRejection>,
    pub warnings: Vec<String>,
}

impl ParseResult {
    /// "N read → M kept" summary line
    pub fn summary_line(&self) -> String {
        format!("{} read → {} kept", self.read, self.records.len())
    }
}

/// Identifies the uploaded file a batch of records came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub key: String,
    pub filename: String,
}

impl SourceFile {
    pub fn new(key: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            filename: filename.into(),
        }
    }
}

/// Counts returned by an ingestion call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records handed to ingestion
    pub received: usize,
    /// Records that passed sanitation
    pub accepted: usize,
    /// Records dropped by sanitation
    pub rejected: usize,
    /// Previously stored records replaced for the same file key
    pub deleted: usize,
    /// Records actually persisted
    pub inserted: usize,
}

/// An entry in the uploaded-file registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: i64,
    pub key: String,
    pub owner: String,
    pub filename: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub sha256: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A file about to be registered
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub key: String,
    pub owner: String,
    pub filename: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub sha256: Option<String>,
}

/// Stored record count for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodCount {
    pub period: Period,
    pub records: i64,
}
