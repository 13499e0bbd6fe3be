//! Doctor database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Doctor, DoctorReferences};

const DOCTOR_COLUMNS: &str = "doctor_id, name, active, user_profile_id, created_at, updated_at";

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        doctor_id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        user_profile_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Database {
    /// Insert a new doctor.
    pub fn insert_doctor(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO doctors (
                    doctor_id, name, active, user_profile_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    doctor.doctor_id,
                    doctor.name,
                    doctor.active,
                    doctor.user_profile_id,
                    doctor.created_at,
                    doctor.updated_at,
                ],
            )
            .map_err(|e| DbError::from_write(e, "insert doctor"))?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, doctor_id: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM doctors WHERE doctor_id = ?", DOCTOR_COLUMNS),
                [doctor_id],
                doctor_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List doctors ordered by name.
    pub fn list_doctors(&self, include_archived: bool) -> DbResult<Vec<Doctor>> {
        let sql = if include_archived {
            format!("SELECT {} FROM doctors ORDER BY name", DOCTOR_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM doctors WHERE active = 1 ORDER BY name",
                DOCTOR_COLUMNS
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], doctor_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Rename a doctor.
    pub fn rename_doctor(&self, doctor_id: &str, name: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE doctors SET name = ?2, updated_at = datetime('now') WHERE doctor_id = ?1",
            params![doctor_id, name],
        )?;
        Ok(rows_affected > 0)
    }

    /// Archive (false) or restore (true) a doctor.
    pub fn set_doctor_active(&self, doctor_id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE doctors SET active = ?2, updated_at = datetime('now') WHERE doctor_id = ?1",
            params![doctor_id, active],
        )?;
        Ok(rows_affected > 0)
    }

    /// Link a doctor to a user profile, or unlink with `None`.
    pub fn set_doctor_user_profile(
        &self,
        doctor_id: &str,
        user_profile_id: Option<&str>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE doctors SET user_profile_id = ?2, updated_at = datetime('now') WHERE doctor_id = ?1",
            params![doctor_id, user_profile_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Count everything that references a doctor.
    pub fn doctor_references(&self, doctor_id: &str) -> DbResult<DoctorReferences> {
        let (slot_assignments, absences, user_profile): (u32, u32, bool) = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM slot_assignments WHERE doctor_id = ?1),
                (SELECT COUNT(*) FROM absences WHERE doctor_id = ?1),
                (SELECT user_profile_id IS NOT NULL FROM doctors WHERE doctor_id = ?1)
            "#,
            [doctor_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get::<_, Option<bool>>(2)?.unwrap_or(false),
                ))
            },
        )?;
        Ok(DoctorReferences {
            slot_assignments,
            absences,
            user_profile,
        })
    }

    /// Hard-delete a doctor row.
    pub fn delete_doctor(&self, doctor_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM doctors WHERE doctor_id = ?", [doctor_id])
            .map_err(|e| DbError::from_write(e, "delete doctor"))?;
        Ok(rows_affected > 0)
    }
}
