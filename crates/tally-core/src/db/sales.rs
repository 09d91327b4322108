//! Sales record operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Month, NewSale, Period, PeriodCount, SalesRecord, SourceFile};
use crate::store::{RecordFilter, RecordStore, RecordWriter};

const SALE_COLUMNS: &str = "id, owner, product, quantity, unit_price, total_revenue, month, year,
     transaction_date, transaction_id, category, region, source_filename, source_file_key,
     created_at";

/// Insert on an existing connection or transaction, without committing
fn insert_sales(
    conn: &Connection,
    owner: &str,
    source: &SourceFile,
    records: &[NewSale],
) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO sales (owner, product, quantity, unit_price, total_revenue, month, year,
         transaction_date, transaction_id, category, region, source_filename, source_file_key)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    let mut inserted = 0;
    for sale in records {
        inserted += stmt.execute(params![
            owner,
            sale.product,
            sale.quantity,
            sale.unit_price,
            sale.total_revenue,
            sale.month.as_str(),
            sale.year,
            sale.transaction_date.map(|d| d.to_rfc3339()),
            sale.transaction_id,
            sale.category,
            sale.region,
            source.filename,
            source.key,
        ])?;
    }
    Ok(inserted)
}

fn delete_sales(conn: &Connection, filter: &RecordFilter) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM sales WHERE owner = ?1 AND (?2 IS NULL OR source_file_key = ?2)",
        params![filter.owner, filter.source_file_key],
    )?;
    Ok(deleted)
}

/// Writer bound to an open transaction
struct TxWriter<'c> {
    conn: &'c Connection,
}

impl RecordWriter for TxWriter<'_> {
    fn insert(&self, owner: &str, source: &SourceFile, records: &[NewSale]) -> Result<usize> {
        insert_sales(self.conn, owner, source, records)
    }

    fn delete(&self, filter: &RecordFilter) -> Result<usize> {
        delete_sales(self.conn, filter)
    }
}

impl Database {
    /// Helper to convert a row to SalesRecord (column order: `SALE_COLUMNS`)
    fn row_to_sale(row: &rusqlite::Row) -> rusqlite::Result<SalesRecord> {
        let month_str: String = row.get(6)?;
        let transaction_date_str: Option<String> = row.get(8)?;
        let created_at_str: String = row.get(14)?;

        let month: Month = month_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(SalesRecord {
            id: row.get(0)?,
            owner: row.get(1)?,
            product: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
            total_revenue: row.get(5)?,
            month,
            year: row.get(7)?,
            transaction_date: transaction_date_str.and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }),
            transaction_id: row.get(9)?,
            category: row.get(10)?,
            region: row.get(11)?,
            source_filename: row.get(12)?,
            source_file_key: row.get(13)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Count all stored records of one owner
    pub fn count_records(&self, owner: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sales WHERE owner = ?",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl RecordWriter for Database {
    /// Inserts in its own transaction, so a failed batch leaves nothing behind
    fn insert(&self, owner: &str, source: &SourceFile, records: &[NewSale]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let inserted = insert_sales(&tx, owner, source, records)?;
        tx.commit()?;
        debug!(owner, key = %source.key, inserted, "Inserted sales records");
        Ok(inserted)
    }

    fn delete(&self, filter: &RecordFilter) -> Result<usize> {
        let conn = self.conn()?;
        delete_sales(&conn, filter)
    }
}

impl RecordStore for Database {
    fn select(&self, filter: &RecordFilter) -> Result<Vec<SalesRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sales
             WHERE owner = ?1 AND (?2 IS NULL OR source_file_key = ?2)
             ORDER BY id ASC",
            SALE_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![filter.owner, filter.source_file_key], |row| {
                Self::row_to_sale(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_by_period(&self, owner: &str) -> Result<Vec<PeriodCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT month, year, COUNT(*) FROM sales WHERE owner = ? GROUP BY year, month",
        )?;

        let rows = stmt
            .query_map(params![owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i32>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts: Vec<PeriodCount> = rows
            .into_iter()
            .filter_map(|(month, year, records)| {
                let month: Month = month.parse().ok()?;
                Some(PeriodCount {
                    period: Period::new(month, year),
                    records,
                })
            })
            .collect();
        counts.sort_by_key(|c| (c.period.year, c.period.month));
        Ok(counts)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn RecordWriter) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // Dropping `tx` without commit rolls back
        let value = f(&TxWriter { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}
