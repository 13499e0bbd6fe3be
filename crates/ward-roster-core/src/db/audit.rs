//! Change log database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};

/// A stored change log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRow {
    pub seq: i64,
    pub week_id: Option<String>,
    pub action: String,
    pub actor: String,
    pub payload: String,
    pub prev_hash: String,
    pub entry_hash: String,
    pub created_at: String,
}

const CHANGE_COLUMNS: &str =
    "seq, week_id, action, actor, payload, prev_hash, entry_hash, created_at";

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeRow> {
    Ok(ChangeRow {
        seq: row.get(0)?,
        week_id: row.get(1)?,
        action: row.get(2)?,
        actor: row.get(3)?,
        payload: row.get(4)?,
        prev_hash: row.get(5)?,
        entry_hash: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    /// Append an entry; returns its sequence number.
    pub fn insert_change(
        &self,
        week_id: Option<&str>,
        action: &str,
        actor: &str,
        payload: &str,
        prev_hash: &str,
        entry_hash: &str,
    ) -> DbResult<i64> {
        self.conn
            .execute(
                r#"
                INSERT INTO change_log (week_id, action, actor, payload, prev_hash, entry_hash)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![week_id, action, actor, payload, prev_hash, entry_hash],
            )
            .map_err(|e| DbError::from_write(e, "append change log entry"))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent entry, if any.
    pub fn last_change(&self) -> DbResult<Option<ChangeRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM change_log ORDER BY seq DESC LIMIT 1",
                    CHANGE_COLUMNS
                ),
                [],
                change_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Every entry, oldest first.
    pub fn list_changes(&self) -> DbResult<Vec<ChangeRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM change_log ORDER BY seq",
            CHANGE_COLUMNS
        ))?;
        let rows = stmt.query_map([], change_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Entries for one week, oldest first.
    pub fn list_changes_for_week(&self, week_id: &str) -> DbResult<Vec<ChangeRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM change_log WHERE week_id = ? ORDER BY seq",
            CHANGE_COLUMNS
        ))?;
        let rows = stmt.query_map([week_id], change_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
