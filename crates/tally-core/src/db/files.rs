//! Uploaded file registry

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewUploadedFile, UploadedFile};
use crate::store::FileRegistry;

impl Database {
    /// Helper to convert a row to UploadedFile
    fn row_to_uploaded_file(row: &rusqlite::Row) -> rusqlite::Result<UploadedFile> {
        let created_at_str: String = row.get(7)?;
        Ok(UploadedFile {
            id: row.get(0)?,
            key: row.get(1)?,
            owner: row.get(2)?,
            filename: row.get(3)?,
            size_bytes: row.get(4)?,
            content_type: row.get(5)?,
            sha256: row.get(6)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Get a registry entry by key
    pub fn get_file(&self, key: &str) -> Result<Option<UploadedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, key, owner, filename, size_bytes, content_type, sha256, created_at
             FROM uploaded_files WHERE key = ?",
        )?;

        let file = stmt
            .query_row(params![key], |row| Self::row_to_uploaded_file(row))
            .optional()?;

        Ok(file)
    }
}

impl FileRegistry for Database {
    fn owner_of(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let owner = conn
            .query_row(
                "SELECT owner FROM uploaded_files WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    fn register(&self, file: &NewUploadedFile) -> Result<i64> {
        if let Some(owner) = self.owner_of(&file.key)? {
            if owner != file.owner {
                return Err(Error::Forbidden {
                    key: file.key.clone(),
                });
            }
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO uploaded_files (key, owner, filename, size_bytes, content_type, sha256)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                filename = excluded.filename,
                size_bytes = excluded.size_bytes,
                content_type = excluded.content_type,
                sha256 = excluded.sha256,
                created_at = CURRENT_TIMESTAMP",
            params![
                file.key,
                file.owner,
                file.filename,
                file.size_bytes,
                file.content_type,
                file.sha256,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM uploaded_files WHERE key = ?",
            params![file.key],
            |row| row.get(0),
        )?;
        debug!(key = %file.key, id, "Registered uploaded file");
        Ok(id)
    }

    fn list_files(&self, owner: &str) -> Result<Vec<UploadedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, key, owner, filename, size_bytes, content_type, sha256, created_at
             FROM uploaded_files WHERE owner = ? ORDER BY created_at DESC, id DESC",
        )?;

        let files = stmt
            .query_map(params![owner], |row| Self::row_to_uploaded_file(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(files)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM uploaded_files WHERE key = ?", params![key])?;
        Ok(removed > 0)
    }
}
