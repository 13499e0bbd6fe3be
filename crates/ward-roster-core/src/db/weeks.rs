//! Week database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Week, WeekStatus};

const WEEK_COLUMNS: &str =
    "week_id, week_start, status, approved_at, approved_by, created_at, updated_at";

impl Database {
    /// Insert a week unless one already exists for its Monday; return the stored row.
    pub fn insert_week_if_absent(&self, week: &Week) -> DbResult<Week> {
        self.conn.execute(
            r#"
            INSERT INTO weeks (
                week_id, week_start, status, approved_at, approved_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(week_start) DO NOTHING
            "#,
            params![
                week.week_id,
                week.week_start,
                week.status.as_str(),
                week.approved_at,
                week.approved_by,
                week.created_at,
                week.updated_at,
            ],
        )?;

        self.get_week_by_start(week.week_start)?
            .ok_or_else(|| DbError::NotFound(format!("week starting {}", week.week_start)))
    }

    /// Get a week by ID.
    pub fn get_week(&self, week_id: &str) -> DbResult<Option<Week>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM weeks WHERE week_id = ?", WEEK_COLUMNS),
                [week_id],
                WeekRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get the week starting on the given Monday.
    pub fn get_week_by_start(&self, week_start: NaiveDate) -> DbResult<Option<Week>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM weeks WHERE week_start = ?", WEEK_COLUMNS),
                [week_start],
                WeekRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List weeks whose Monday lies in `from..=to`, oldest first.
    pub fn list_weeks_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<Week>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM weeks WHERE week_start BETWEEN ?1 AND ?2 ORDER BY week_start",
            WEEK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![from, to], WeekRow::from_row)?;

        let mut weeks = Vec::new();
        for row in rows {
            weeks.push(row?.try_into()?);
        }
        Ok(weeks)
    }

    /// Mark a week approved with the given metadata.
    pub fn mark_week_approved(
        &self,
        week_id: &str,
        approved_at: &str,
        approved_by: &str,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE weeks SET
                status = 'approved',
                approved_at = ?2,
                approved_by = ?3,
                updated_at = datetime('now')
            WHERE week_id = ?1
            "#,
            params![week_id, approved_at, approved_by],
        )?;
        Ok(rows_affected > 0)
    }

    /// Return a week to draft and clear its approval metadata.
    pub fn mark_week_draft(&self, week_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE weeks SET
                status = 'draft',
                approved_at = NULL,
                approved_by = NULL,
                updated_at = datetime('now')
            WHERE week_id = ?1
            "#,
            [week_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Bump a week's `updated_at`.
    pub fn touch_week(&self, week_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE weeks SET updated_at = datetime('now') WHERE week_id = ?",
            [week_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a week (its rows cascade).
    pub fn delete_week(&self, week_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM weeks WHERE week_id = ?", [week_id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct WeekRow {
    week_id: String,
    week_start: NaiveDate,
    status: String,
    approved_at: Option<String>,
    approved_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl WeekRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            week_id: row.get(0)?,
            week_start: row.get(1)?,
            status: row.get(2)?,
            approved_at: row.get(3)?,
            approved_by: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<WeekRow> for Week {
    type Error = DbError;

    fn try_from(row: WeekRow) -> Result<Self, Self::Error> {
        let status = WeekStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown week status: {}", row.status)))?;

        Ok(Week {
            week_id: row.week_id,
            week_start: row.week_start,
            status,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
