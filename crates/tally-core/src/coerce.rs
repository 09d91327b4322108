//! Row coercion and validation
//!
//! Turns a [`NormalizedRow`] into a typed [`NewSale`] or a [`RowRejection`].
//! Only the product and the quantity are required; a bad optional value is
//! reported as a warning and stored as absent.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::models::{Cell, NewSale, Period, RejectReason, RowRejection};
use crate::normalize::NormalizedRow;

/// Where a row sits, for error reporting and provenance
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    /// 1-based row below the header
    pub row: usize,
    pub period: Period,
    pub filename: &'a str,
}

/// An accepted row plus any notes about optional values that were dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub sale: NewSale,
    pub warnings: Vec<String>,
}

/// Coerce one normalized row
pub fn coerce_row(
    row: &NormalizedRow,
    ctx: &RowContext<'_>,
) -> std::result::Result<Coerced, RowRejection> {
    let product = row.product.as_text();
    let reject = |reason| RowRejection {
        row: ctx.row,
        reason,
        product: product.clone(),
        quantity: row.quantity.as_text(),
    };

    if product.is_empty() {
        return Err(reject(RejectReason::MissingProduct));
    }
    let quantity = coerce_quantity(&row.quantity).map_err(reject)?;

    let mut warnings = Vec::new();
    let unit_price = optional_amount(&row.unit_price, "unit price", ctx.row, &mut warnings);
    let total_revenue = optional_amount(&row.total_revenue, "revenue", ctx.row, &mut warnings);

    Ok(Coerced {
        sale: NewSale {
            product,
            quantity,
            unit_price,
            total_revenue,
            month: ctx.period.month,
            year: ctx.period.year,
            transaction_date: parse_transaction_date(&row.transaction_date),
            transaction_id: optional_text(&row.transaction_id),
            category: optional_text(&row.category),
            region: optional_text(&row.region),
            source_filename: ctx.filename.to_string(),
        },
        warnings,
    })
}

/// Required, finite and non-negative. Fractions are truncated, not rounded.
fn coerce_quantity(cell: &Cell) -> std::result::Result<i64, RejectReason> {
    let value = match cell {
        Cell::Empty => return Err(RejectReason::MissingQuantity),
        Cell::Number(n) | Cell::DateTime(n) => *n,
        Cell::Text(s) if s.trim().is_empty() => return Err(RejectReason::MissingQuantity),
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::InvalidQuantity)?,
        Cell::Bool(_) => return Err(RejectReason::InvalidQuantity),
    };

    if !value.is_finite() {
        return Err(RejectReason::InvalidQuantity);
    }
    if value < 0.0 {
        return Err(RejectReason::NegativeQuantity);
    }
    Ok(value.trunc() as i64)
}

/// Parse a decimal that may use a comma as decimal separator.
///
/// Empty stays `None` (not zero). Only the first comma is replaced, so
/// "1.234,50" is rejected rather than guessed at.
pub fn parse_decimal(cell: &Cell) -> std::result::Result<Option<f64>, String> {
    let value = match cell {
        Cell::Empty => return Ok(None),
        Cell::Number(n) | Cell::DateTime(n) => *n,
        Cell::Text(s) if s.trim().is_empty() => return Ok(None),
        Cell::Text(s) => s
            .trim()
            .replacen(',', ".", 1)
            .parse::<f64>()
            .map_err(|_| format!("\"{}\" is not a number", s.trim()))?,
        Cell::Bool(b) => return Err(format!("\"{}\" is not a number", b)),
    };

    if !value.is_finite() {
        return Err(format!("{} is not finite", value));
    }
    Ok(Some(value))
}

fn optional_amount(cell: &Cell, label: &str, row: usize, warnings: &mut Vec<String>) -> Option<f64> {
    match parse_decimal(cell) {
        Ok(Some(v)) if v < 0.0 => {
            warnings.push(format!("Row {}: negative {} {} ignored", row, label, v));
            None
        }
        Ok(v) => v,
        Err(e) => {
            warnings.push(format!("Row {}: {} ignored, {}", row, label, e));
            None
        }
    }
}

fn optional_text(cell: &Cell) -> Option<String> {
    let text = cell.as_text();
    (!text.is_empty()).then_some(text)
}

/// Excel counts days from 1899-12-30 (accounting for its 1900 leap-year bug)
fn excel_serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch
        .checked_add_signed(Duration::milliseconds(millis))
        .map(|dt| dt.and_utc())
}

/// Best-effort date for the `data`/`date` column; unparseable means absent
pub fn parse_transaction_date(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        Cell::Number(n) | Cell::DateTime(n) => excel_serial_to_datetime(*n),
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(dt.and_utc());
                }
            }
            for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
                if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                    return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
            }
            None
        }
        Cell::Empty | Cell::Bool(_) => None,
    }
}
