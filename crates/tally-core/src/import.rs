//! Spreadsheet parsing
//!
//! Reads the first sheet of an uploaded workbook (or a delimited text file),
//! maps its headers onto the recognized fields and coerces every data row.
//! The period always comes from the file name.
//!
//! The format comes from the extension. A workbook extension on bytes that
//! carry no workbook magic (zip or OLE container) falls back to content
//! sniffing, so text exports renamed to `.xlsx` by other tools still import.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::coerce::{coerce_row, RowContext};
use crate::error::{Error, Result};
use crate::models::{Cell, ParseResult};
use crate::normalize::{Field, HeaderMap};
use crate::period::extract_period_with_fallback;

/// Records outside this range are refused at ingestion
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 2000..=2100;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &str = "\u{feff}";
const WORKBOOK_EXTENSIONS: [&str; 3] = [".xlsx", ".xls", ".ods"];

/// Physical layout of the uploaded bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// xlsx, xls or ods
    Workbook,
    /// Delimited text
    Delimited,
}

impl SheetFormat {
    /// Decide the format from the file extension, then from content
    pub fn detect(bytes: &[u8], filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            return Self::Delimited;
        }
        let sniffed = Self::sniff(bytes);
        if sniffed == Self::Delimited && WORKBOOK_EXTENSIONS.iter().any(|e| lower.ends_with(e)) {
            debug!(filename, "Workbook extension without workbook content, reading as text");
        }
        sniffed
    }

    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            Self::Workbook
        } else {
            Self::Delimited
        }
    }
}

/// Knobs for [`parse_spreadsheet_with`]
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Year to use when the file name has a month but no year
    pub fallback_year: Option<i32>,
    /// How many accepted records to keep in [`ParseResult::sample`]
    pub sample_size: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            fallback_year: None,
            sample_size: 5,
        }
    }
}

/// Parse an uploaded spreadsheet with default options
pub fn parse_spreadsheet(bytes: &[u8], filename: &str) -> Result<ParseResult> {
    parse_spreadsheet_with(bytes, filename, &ParseOptions::default())
}

/// Parse an uploaded spreadsheet into accepted records and diagnostics.
///
/// Fails only when the period cannot be derived from `filename` or the bytes
/// are not readable as a table. Bad rows are reported, never fatal.
pub fn parse_spreadsheet_with(
    bytes: &[u8],
    filename: &str,
    options: &ParseOptions,
) -> Result<ParseResult> {
    let period = extract_period_with_fallback(filename, options.fallback_year)?;

    // Row numbers count from the header and include blank lines, so they
    // match what the user sees in the sheet.
    let mut rows = read_rows(bytes, filename)?
        .into_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()));

    let mut warnings = Vec::new();
    if !YEAR_RANGE.contains(&period.year) {
        warnings.push(format!(
            "Year {} is outside {}-{}; these records will be refused on upload",
            period.year,
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        ));
    }

    let (header_idx, headers): (usize, Vec<String>) = rows
        .next()
        .map(|(idx, row)| (idx, row.iter().map(Cell::as_text).collect()))
        .unwrap_or_default();
    let header_map = HeaderMap::from_headers(&headers);

    for field in [Field::Product, Field::Quantity] {
        if !header_map.has(field) {
            warnings.push(format!(
                "No column recognized for {} (expected one of: {})",
                field.as_str(),
                field.synonyms().join(", ")
            ));
        }
    }
    if !header_map.unmatched().is_empty() {
        debug!(filename, columns = ?header_map.unmatched(), "Ignoring unrecognized columns");
    }

    let mut records = Vec::new();
    let mut rejections = Vec::new();
    let mut read = 0;

    for (idx, row) in rows {
        read += 1;
        let ctx = RowContext {
            row: idx - header_idx,
            period,
            filename,
        };
        match coerce_row(&header_map.project(&row), &ctx) {
            Ok(coerced) => {
                warnings.extend(coerced.warnings);
                records.push(coerced.sale);
            }
            Err(rejection) => {
                warnings.push(rejection.to_string());
                rejections.push(rejection);
            }
        }
    }

    if records.is_empty() {
        warnings.push(format!("No valid rows found in {}", filename));
    }

    let products: HashSet<&str> = records.iter().map(|r| r.product.as_str()).collect();
    let total_quantity: i64 = records.iter().map(|r| r.quantity).sum();
    let total_revenue: f64 = records.iter().filter_map(|r| r.total_revenue).sum();
    info!(
        filename,
        %period,
        read,
        kept = records.len(),
        rejected = rejections.len(),
        products = products.len(),
        total_quantity,
        total_revenue,
        "Parsed spreadsheet"
    );
    if !rejections.is_empty() {
        warn!(filename, rejected = rejections.len(), "Some rows were skipped");
    }

    let sample = records.iter().take(options.sample_size).cloned().collect();
    Ok(ParseResult {
        period,
        records,
        read,
        sample,
        rejections,
        warnings,
    })
}

/// Read every row of the first sheet, header row included
pub fn read_rows(bytes: &[u8], filename: &str) -> Result<Vec<Vec<Cell>>> {
    if bytes.is_empty() {
        return Err(unreadable(filename, "file is empty"));
    }
    match SheetFormat::detect(bytes, filename) {
        SheetFormat::Workbook => read_workbook(bytes, filename),
        SheetFormat::Delimited => read_delimited(bytes, filename),
    }
}

fn unreadable(filename: &str, reason: impl Into<String>) -> Error {
    Error::UnreadableFile {
        filename: filename.to_string(),
        reason: reason.into(),
    }
}

fn read_workbook(bytes: &[u8], filename: &str) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| unreadable(filename, e.to_string()))?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| unreadable(filename, "workbook has no sheets"))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| unreadable(filename, e.to_string()))?;

    debug!(filename, sheet = %first_sheet, size = ?range.get_size(), "Reading worksheet");

    Ok(range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect())
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn read_delimited(bytes: &[u8], filename: &str) -> Result<Vec<Vec<Cell>>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| unreadable(filename, format!("not a spreadsheet or UTF-8 text ({})", e)))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

    let delimiter = sniff_delimiter(text);
    debug!(filename, delimiter = %(delimiter as char).escape_default(), "Reading delimited text");

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut next_line = 1;
    for record in rdr.records() {
        let record = record.map_err(|e| unreadable(filename, e.to_string()))?;
        // The reader drops blank lines; keep them as empty rows
        let line = record.position().map_or(next_line, |pos| pos.line());
        for _ in next_line..line {
            rows.push(Vec::new());
        }
        let embedded: u64 = record.iter().map(|f| f.matches('\n').count() as u64).sum();
        next_line = line + 1 + embedded;

        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Pick the most frequent of `;`, `,` and tab on the first non-blank line.
///
/// Semicolons are common in locales that write decimals with a comma.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let count = |c: char| header.matches(c).count();

    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|&d| (count(d as char), d == b','))
        .filter(|&d| count(d as char) > 0)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Month, Period, RejectReason};

    #[test]
    fn test_sniff_format() {
        assert_eq!(SheetFormat::sniff(b"PK\x03\x04rest"), SheetFormat::Workbook);
        assert_eq!(SheetFormat::sniff(OLE_MAGIC), SheetFormat::Workbook);
        assert_eq!(SheetFormat::sniff(b"produto,quantidade"), SheetFormat::Delimited);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(SheetFormat::detect(b"PK\x03\x04", "a.csv"), SheetFormat::Delimited);
        assert_eq!(SheetFormat::detect(b"PK\x03\x04", "a.xlsx"), SheetFormat::Workbook);
        assert_eq!(SheetFormat::detect(b"produto,qtd", "a.xlsx"), SheetFormat::Delimited);
        assert_eq!(SheetFormat::detect(OLE_MAGIC, "a.dat"), SheetFormat::Workbook);
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("produto;quantidade;preco\n"), b';');
        assert_eq!(sniff_delimiter("produto,quantidade\n"), b',');
        assert_eq!(sniff_delimiter("produto\tquantidade\n"), b'\t');
        assert_eq!(sniff_delimiter("\n\nproduto\n"), b',');
    }

    #[test]
    fn test_parse_csv() {
        let data = "Produto,Quantidade,Preço Unitário\nCaneta,10,\"2,50\"\nLápis,3,1\n";
        let result = parse_spreadsheet(data.as_bytes(), "Janeiro 2025.csv").unwrap();

        assert_eq!(result.period, Period::new(Month::Janeiro, 2025));
        assert_eq!(result.read, 2);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].unit_price, Some(2.5));
        assert!(result.warnings.is_empty());
        assert_eq!(result.summary_line(), "2 read → 2 kept");
    }

    #[test]
    fn test_parse_semicolon_with_bom() {
        let data = "\u{feff}produto;qtd;receita_total\nCaderno;4;19,90\n";
        let result = parse_spreadsheet(data.as_bytes(), "março-2024.csv").unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].product, "Caderno");
        assert_eq!(result.records[0].total_revenue, Some(19.9));
        assert_eq!(result.period.month, Month::Marco);
    }

    #[test]
    fn test_rejections_become_warnings() {
        let data = "produto,quantidade\nA,5\n,3\nB,abc\n";
        let result = parse_spreadsheet(data.as_bytes(), "Fevereiro-2025.csv").unwrap();

        assert_eq!(result.read, 3);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.rejections.len(), 2);
        assert_eq!(result.rejections[0].reason, RejectReason::MissingProduct);
        assert_eq!(result.rejections[1].reason, RejectReason::InvalidQuantity);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].starts_with("Row 2"));
    }

    #[test]
    fn test_blank_rows_not_counted() {
        let data = "produto,quantidade\n\nA,1\n,\nB,2\n";
        let result = parse_spreadsheet(data.as_bytes(), "Maio 2025.csv").unwrap();
        assert_eq!(result.read, 2);
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_row_numbers_include_blank_lines() {
        let data = "produto,quantidade\nA,1\n\n,\n\nB,abc\n";
        let result = parse_spreadsheet(data.as_bytes(), "Maio 2025.csv").unwrap();
        assert_eq!(result.read, 2);
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].row, 5);
        assert!(result.warnings[0].starts_with("Row 5"));
    }

    #[test]
    fn test_row_numbers_after_multiline_cell() {
        let data = "produto,quantidade\n\"Caneta\nazul\",1\n,2\n";
        let result = parse_spreadsheet(data.as_bytes(), "Maio 2025.csv").unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.rejections[0].row, 2);
    }

    #[test]
    fn test_header_only_warns() {
        let result = parse_spreadsheet(b"produto,quantidade\n", "Junho 2025.csv").unwrap();
        assert_eq!(result.read, 0);
        assert!(result.records.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("No valid rows"));
    }

    #[test]
    fn test_missing_columns_warn() {
        let result = parse_spreadsheet(b"item,count\nA,1\n", "Julho 2025.csv").unwrap();
        assert!(result.records.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("No column recognized for product")));
        assert!(result.warnings.iter().any(|w| w.contains("No column recognized for quantity")));
    }

    #[test]
    fn test_sample_is_bounded() {
        let mut data = String::from("produto,quantidade\n");
        for i in 0..8 {
            data.push_str(&format!("P{},{}\n", i, i));
        }
        let result = parse_spreadsheet(data.as_bytes(), "Agosto 2025.csv").unwrap();
        assert_eq!(result.records.len(), 8);
        assert_eq!(result.sample.len(), 5);
        assert_eq!(result.sample[0].product, "P0");
    }

    #[test]
    fn test_period_error_before_reading() {
        let err = parse_spreadsheet(b"produto,quantidade\nA,1\n", "vendas.csv").unwrap_err();
        assert!(matches!(err, Error::PeriodNotFound { .. }));
    }

    #[test]
    fn test_fallback_year_option() {
        let options = ParseOptions {
            fallback_year: Some(2026),
            ..Default::default()
        };
        let result =
            parse_spreadsheet_with(b"produto,quantidade\nA,1\n", "Outubro.csv", &options).unwrap();
        assert_eq!(result.period, Period::new(Month::Outubro, 2026));
    }

    #[test]
    fn test_parse_workbook_reads_first_sheet() {
        let bytes = include_bytes!("../tests/fixtures/Fevereiro-2025.xlsx");
        assert_eq!(SheetFormat::detect(bytes, "Fevereiro-2025.xlsx"), SheetFormat::Workbook);

        let rows = read_rows(bytes, "Fevereiro-2025.xlsx").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][2], Cell::Text("Preço Unitário".into()));
        assert!(matches!(rows[1][3], Cell::DateTime(_) | Cell::Number(_)));
        assert_eq!(rows[2][0], Cell::Empty);
    }

    #[test]
    fn test_unreadable_bytes() {
        let err = parse_spreadsheet(&[0xff, 0xfe, 0x00, 0x81], "Abril 2025.xlsx").unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));

        let err = parse_spreadsheet(b"PK\x03\x04garbage", "Abril 2025.xlsx").unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));

        let err = parse_spreadsheet(b"", "Abril 2025.csv").unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));

        let err = parse_spreadsheet(&[0x80, 0x81, b'\n'], "Abril 2025.csv").unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));
    }

    #[test]
    fn test_old_year_warns() {
        let result = parse_spreadsheet(b"produto,quantidade\nA,1\n", "Julho 1999.csv").unwrap();
        assert_eq!(result.records.len(), 1);
        assert!(result.warnings[0].contains("1999"));
    }
}
