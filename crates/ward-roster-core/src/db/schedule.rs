//! Slot assignment and absence database operations.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Absence, AbsenceReason, Role, Slot, SlotAssignment, SlotKey, WeekSchedule};

/// Distinct (doctor, date) absence pattern of a week, used for carry-forward.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsenceDay {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub reason: AbsenceReason,
    pub note: Option<String>,
}

impl Database {
    /// All slot assignments of a week, in calendar order.
    pub fn list_slot_assignments(&self, week_id: &str) -> DbResult<Vec<SlotAssignment>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, slot, doctor_id, role
            FROM slot_assignments
            WHERE week_id = ?
            ORDER BY date, slot, doctor_id
            "#,
        )?;
        let rows = stmt.query_map([week_id], |row| {
            Ok(AssignmentRow {
                date: row.get(0)?,
                slot: row.get(1)?,
                doctor_id: row.get(2)?,
                role: row.get(3)?,
            })
        })?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(row?.try_into()?);
        }
        Ok(assignments)
    }

    /// All absences of a week, in calendar order.
    pub fn list_absences(&self, week_id: &str) -> DbResult<Vec<Absence>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, slot, doctor_id, reason, note
            FROM absences
            WHERE week_id = ?
            ORDER BY date, slot, doctor_id
            "#,
        )?;
        let rows = stmt.query_map([week_id], |row| {
            Ok(AbsenceRow {
                date: row.get(0)?,
                slot: row.get(1)?,
                doctor_id: row.get(2)?,
                reason: row.get(3)?,
                note: row.get(4)?,
            })
        })?;

        let mut absences = Vec::new();
        for row in rows {
            absences.push(row?.try_into()?);
        }
        Ok(absences)
    }

    /// Insert one slot assignment. A second admissions doctor for the slot is a
    /// `Constraint` error.
    pub fn insert_slot_assignment(&self, week_id: &str, assignment: &SlotAssignment) -> DbResult<()> {
        self.conn
            .execute(
                "INSERT INTO slot_assignments (week_id, date, slot, doctor_id, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    week_id,
                    assignment.date,
                    assignment.slot.as_str(),
                    assignment.doctor_id,
                    assignment.role.as_str(),
                ],
            )
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!(
                        "{} {} for doctor {} on {}",
                        assignment.role.as_str(),
                        assignment.slot,
                        assignment.doctor_id,
                        assignment.date
                    ),
                )
            })?;
        Ok(())
    }

    /// Insert one absence. Returns false when the doctor already has an absence
    /// in that slot (the existing row is kept).
    pub fn insert_absence(&self, week_id: &str, absence: &Absence) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute(
                r#"
                INSERT INTO absences (week_id, date, slot, doctor_id, reason, note)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(week_id, date, slot, doctor_id) DO NOTHING
                "#,
                params![
                    week_id,
                    absence.date,
                    absence.slot.as_str(),
                    absence.doctor_id,
                    absence.reason.as_str(),
                    absence.note,
                ],
            )
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!("absence for doctor {} on {} {}", absence.doctor_id, absence.date, absence.slot),
                )
            })?;
        Ok(rows_affected > 0)
    }

    /// Replace every slot assignment and absence of a week with `schedule`.
    ///
    /// Not transactional on its own; callers wrap it in `write_transaction`.
    pub fn replace_week_schedule(&self, week_id: &str, schedule: &WeekSchedule) -> DbResult<()> {
        self.conn
            .execute("DELETE FROM slot_assignments WHERE week_id = ?", [week_id])?;
        self.conn
            .execute("DELETE FROM absences WHERE week_id = ?", [week_id])?;

        for assignment in schedule.assignments() {
            self.insert_slot_assignment(week_id, assignment)?;
        }
        for absence in schedule.absences() {
            if !self.insert_absence(week_id, absence)? {
                return Err(DbError::Constraint(format!(
                    "duplicate absence for doctor {} on {} {}",
                    absence.doctor_id, absence.date, absence.slot
                )));
            }
        }
        Ok(())
    }

    /// Delete the ward rows and absences of a week, keeping admissions.
    /// Returns (ward rows deleted, absences deleted).
    pub fn delete_ward_and_absences(&self, week_id: &str) -> DbResult<(usize, usize)> {
        let ward = self.conn.execute(
            "DELETE FROM slot_assignments WHERE week_id = ? AND role = 'WARD'",
            [week_id],
        )?;
        let absences = self
            .conn
            .execute("DELETE FROM absences WHERE week_id = ?", [week_id])?;
        Ok((ward, absences))
    }

    /// Admissions doctor of a slot, if any.
    pub fn admissions_doctor(
        &self,
        week_id: &str,
        date: NaiveDate,
        slot: Slot,
    ) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                r#"
                SELECT doctor_id FROM slot_assignments
                WHERE week_id = ?1 AND date = ?2 AND slot = ?3 AND role = 'ADMISSIONS'
                "#,
                params![week_id, date, slot.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Number of admissions rows per (date, slot) of a week.
    pub fn admissions_counts(&self, week_id: &str) -> DbResult<BTreeMap<SlotKey, u32>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, slot, COUNT(*)
            FROM slot_assignments
            WHERE week_id = ? AND role = 'ADMISSIONS'
            GROUP BY date, slot
            "#,
        )?;
        let rows = stmt.query_map([week_id], |row| {
            Ok((
                row.get::<_, NaiveDate>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (date, slot, count) = row?;
            counts.insert(SlotKey::new(date, parse_slot(&slot)?), count);
        }
        Ok(counts)
    }

    /// Number of (ward rows, absence rows) of a week.
    pub fn coverage_row_counts(&self, week_id: &str) -> DbResult<(u32, u32)> {
        self.conn
            .query_row(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM slot_assignments WHERE week_id = ?1 AND role = 'WARD'),
                    (SELECT COUNT(*) FROM absences WHERE week_id = ?1)
                "#,
                [week_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(Into::into)
    }

    /// Distinct (doctor, date) pairs with any ward row in the week.
    pub fn list_ward_days(&self, week_id: &str) -> DbResult<Vec<(String, NaiveDate)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT doctor_id, date
            FROM slot_assignments
            WHERE week_id = ? AND role = 'WARD'
            ORDER BY date, doctor_id
            "#,
        )?;
        let rows = stmt.query_map([week_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct (doctor, date, reason, note) absences of the week.
    pub fn list_absence_days(&self, week_id: &str) -> DbResult<Vec<AbsenceDay>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT doctor_id, date, reason, note
            FROM absences
            WHERE week_id = ?
            ORDER BY date, doctor_id, reason
            "#,
        )?;
        let rows = stmt.query_map([week_id], |row| {
            Ok(AbsenceDay {
                doctor_id: row.get(0)?,
                date: row.get(1)?,
                reason: AbsenceReason::parse_lenient(&row.get::<_, String>(2)?),
                note: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Intermediate row structs for database mapping.
struct AssignmentRow {
    date: NaiveDate,
    slot: String,
    doctor_id: String,
    role: String,
}

struct AbsenceRow {
    date: NaiveDate,
    slot: String,
    doctor_id: String,
    reason: String,
    note: Option<String>,
}

impl TryFrom<AssignmentRow> for SlotAssignment {
    type Error = DbError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;

        Ok(SlotAssignment {
            date: row.date,
            slot: parse_slot(&row.slot)?,
            doctor_id: row.doctor_id,
            role,
        })
    }
}

impl TryFrom<AbsenceRow> for Absence {
    type Error = DbError;

    fn try_from(row: AbsenceRow) -> Result<Self, Self::Error> {
        Ok(Absence {
            date: row.date,
            slot: parse_slot(&row.slot)?,
            doctor_id: row.doctor_id,
            reason: AbsenceReason::parse_lenient(&row.reason),
            note: row.note,
        })
    }
}

fn parse_slot(s: &str) -> Result<Slot, DbError> {
    Slot::parse(s).ok_or_else(|| DbError::Constraint(format!("Unknown slot: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Doctor, Week};

    struct Fixture {
        db: Database,
        week: Week,
        a: String,
        b: String,
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 3).unwrap()
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let a = Doctor::new("Dr. A".into());
        let b = Doctor::new("Dr. B".into());
        db.insert_doctor(&a).unwrap();
        db.insert_doctor(&b).unwrap();
        let week = db
            .insert_week_if_absent(&Week::new(monday()).unwrap())
            .unwrap();
        Fixture {
            db,
            week,
            a: a.doctor_id,
            b: b.doctor_id,
        }
    }

    #[test]
    fn test_second_admissions_is_constraint_error() {
        let f = setup();
        f.db.insert_slot_assignment(
            &f.week.week_id,
            &SlotAssignment::new(monday(), Slot::Am, &f.a, Role::Admissions),
        )
        .unwrap();

        let err = f
            .db
            .insert_slot_assignment(
                &f.week.week_id,
                &SlotAssignment::new(monday(), Slot::Am, &f.b, Role::Admissions),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_unknown_doctor_is_constraint_error() {
        let f = setup();
        let err = f
            .db
            .insert_slot_assignment(
                &f.week.week_id,
                &SlotAssignment::new(monday(), Slot::Am, "ghost", Role::Ward),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_replace_week_schedule() {
        let f = setup();
        let first = WeekSchedule::new(
            monday(),
            vec![
                SlotAssignment::new(monday(), Slot::Am, &f.a, Role::Admissions),
                SlotAssignment::new(monday(), Slot::Am, &f.b, Role::Ward),
            ],
            vec![Absence::new(tuesday(), Slot::Pm, &f.b, AbsenceReason::PostCall, None)],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.week.week_id, &first).unwrap();

        let second = WeekSchedule::new(
            monday(),
            vec![SlotAssignment::new(tuesday(), Slot::Pm, &f.a, Role::Admissions)],
            vec![],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.week.week_id, &second).unwrap();

        let assignments = f.db.list_slot_assignments(&f.week.week_id).unwrap();
        assert_eq!(assignments, second.assignments());
        assert!(f.db.list_absences(&f.week.week_id).unwrap().is_empty());
    }

    #[test]
    fn test_counts_and_distinct_days() {
        let f = setup();
        let schedule = WeekSchedule::new(
            monday(),
            vec![
                SlotAssignment::new(monday(), Slot::Am, &f.a, Role::Admissions),
                SlotAssignment::new(monday(), Slot::Am, &f.b, Role::Ward),
                SlotAssignment::new(monday(), Slot::Pm, &f.b, Role::Ward),
                SlotAssignment::new(tuesday(), Slot::Am, &f.a, Role::Ward),
            ],
            vec![Absence::new(
                tuesday(),
                Slot::Am,
                &f.b,
                AbsenceReason::Training,
                Some("course".into()),
            )],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.week.week_id, &schedule).unwrap();

        let counts = f.db.admissions_counts(&f.week.week_id).unwrap();
        assert_eq!(counts.get(&SlotKey::new(monday(), Slot::Am)), Some(&1));
        assert_eq!(counts.get(&SlotKey::new(monday(), Slot::Pm)), None);

        assert_eq!(f.db.coverage_row_counts(&f.week.week_id).unwrap(), (3, 1));

        let ward_days = f.db.list_ward_days(&f.week.week_id).unwrap();
        assert_eq!(ward_days.len(), 2);

        let absence_days = f.db.list_absence_days(&f.week.week_id).unwrap();
        assert_eq!(absence_days.len(), 1);
        assert_eq!(absence_days[0].note, Some("course".into()));

        assert_eq!(
            f.db.admissions_doctor(&f.week.week_id, monday(), Slot::Am).unwrap(),
            Some(f.a.clone())
        );

        let (ward, absences) = f.db.delete_ward_and_absences(&f.week.week_id).unwrap();
        assert_eq!((ward, absences), (3, 1));
        assert_eq!(f.db.list_slot_assignments(&f.week.week_id).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_reason_reads_as_other() {
        let f = setup();
        f.db.conn()
            .execute(
                "INSERT INTO absences (week_id, date, slot, doctor_id, reason) VALUES (?1, '2024-09-02', 'AM', ?2, 'SABBATICAL')",
                params![f.week.week_id, f.a],
            )
            .unwrap();

        let absences = f.db.list_absences(&f.week.week_id).unwrap();
        assert_eq!(absences[0].reason, AbsenceReason::Other);
    }

    #[test]
    fn test_duplicate_absence_is_ignored() {
        let f = setup();
        let absence = Absence::new(monday(), Slot::Am, &f.a, AbsenceReason::Vacation, None);
        assert!(f.db.insert_absence(&f.week.week_id, &absence).unwrap());

        let other_reason = Absence::new(monday(), Slot::Am, &f.a, AbsenceReason::Training, None);
        assert!(!f.db.insert_absence(&f.week.week_id, &other_reason).unwrap());

        let stored = f.db.list_absences(&f.week.week_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].reason, AbsenceReason::Vacation);
    }
}
