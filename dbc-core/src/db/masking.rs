//! Masking pattern storage. Argument validation happens in
//! [`crate::masking::MaskingRegistry`] before anything reaches these methods.

use rusqlite::{Connection, OptionalExtension, params};

use super::{Database, get_enum, get_time, to_millis};
use crate::error::{Error, Result};
use crate::types::MaskingPattern;

const PATTERN_COLUMNS: &str =
    "id, name, description, masking_type, masking_args, created_at, updated_at";

impl Database {
    pub fn list_masking_patterns(&self) -> Result<Vec<MaskingPattern>> {
        let conn = self.lock()?;
        Self::query_masking_patterns(&conn)
    }

    pub(super) fn query_masking_patterns(conn: &Connection) -> Result<Vec<MaskingPattern>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATTERN_COLUMNS} FROM masking_pattern ORDER BY name, created_at"
        ))?;
        let patterns = stmt
            .query_map([], Self::map_masking_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(patterns)
    }

    pub fn get_masking_pattern(&self, id: &str) -> Result<Option<MaskingPattern>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PATTERN_COLUMNS} FROM masking_pattern WHERE id = ?1"
        ))?;
        Ok(stmt
            .query_row(params![id], Self::map_masking_pattern)
            .optional()?)
    }

    pub fn count_masking_patterns(&self) -> Result<u32> {
        let conn = self.lock()?;
        let count: u32 =
            conn.query_row("SELECT COUNT(*) FROM masking_pattern", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn insert_masking_pattern(&self, pattern: &MaskingPattern) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO masking_pattern
             (id, name, description, masking_type, masking_args, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                pattern.id,
                pattern.name,
                pattern.description,
                pattern.masking_type.as_str(),
                pattern.masking_args,
                to_millis(&pattern.created_at),
                to_millis(&pattern.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Overwrite a stored pattern with `pattern`. `created_at` is left alone.
    pub fn replace_masking_pattern(&self, pattern: &MaskingPattern) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE masking_pattern
             SET name = ?1, description = ?2, masking_type = ?3, masking_args = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                pattern.name,
                pattern.description,
                pattern.masking_type.as_str(),
                pattern.masking_args,
                to_millis(&pattern.updated_at),
                pattern.id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("MaskingPattern", &pattern.id));
        }
        Ok(())
    }

    /// Delete a pattern unless an active policy still references it.
    ///
    /// The reference check and the delete run under one lock.
    pub fn delete_unreferenced_masking_pattern(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let references: u32 = conn.query_row(
            "SELECT COUNT(*) FROM data_access_policy WHERE masking_policy_id = ?1 AND is_active = 1",
            params![id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(Error::conflict(format!(
                "Masking pattern {} is used by {} active polic{}",
                id,
                references,
                if references == 1 { "y" } else { "ies" }
            )));
        }

        let deleted = conn.execute("DELETE FROM masking_pattern WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::not_found("MaskingPattern", id));
        }
        Ok(())
    }

    fn map_masking_pattern(row: &rusqlite::Row) -> rusqlite::Result<MaskingPattern> {
        Ok(MaskingPattern {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            masking_type: get_enum(row, 3)?,
            masking_args: row.get(4)?,
            created_at: get_time(row, 5)?,
            updated_at: get_time(row, 6)?,
        })
    }
}
