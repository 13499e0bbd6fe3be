//! Carry-Forward Merge: seed a draft week from the week before it.
//!
//! The target week's ward rows and absences are replaced wholesale; its
//! admissions rows are kept. Every source ward day is projected onto AM and
//! PM of the date seven days later, skipping slots where the collision policy
//! finds admissions. Source absences are projected the same way without any
//! collision check.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{load_week, Actor, Permission, Roster, RosterError, RosterResult};
use crate::audit::{ChangeAction, ChangeLog};
use crate::models::{Absence, Role, Slot, SlotAssignment};

/// When a projected ward row is blocked by an admissions assignment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Only when the same doctor holds admissions at that date and slot
    #[default]
    SameDoctor,
    /// When any doctor holds admissions at that date and slot
    AnyAdmissions,
}

impl CollisionPolicy {
    fn blocks(&self, admissions: Option<&str>, doctor_id: &str) -> bool {
        match self {
            CollisionPolicy::SameDoctor => admissions == Some(doctor_id),
            CollisionPolicy::AnyAdmissions => admissions.is_some(),
        }
    }
}

/// Row counts of one carry-forward run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarryForwardSummary {
    pub ward_inserted: u32,
    pub absences_inserted: u32,
    pub skipped_due_to_admissions: u32,
}

impl<'a> Roster<'a> {
    /// Overwrite the target week's ward and absence rows with the previous
    /// week's pattern shifted by seven days.
    pub fn copy_week_forward(
        &self,
        actor: &Actor,
        target_week_id: &str,
    ) -> RosterResult<CarryForwardSummary> {
        actor.require(Permission::EditSchedule)?;

        self.db.write_transaction(|db| {
            let target = load_week(db, target_week_id)?;
            if !target.is_draft() {
                return Err(RosterError::WeekLocked(target.week_start));
            }

            let source_start = target.previous_week_start();
            let source = db
                .get_week_by_start(source_start)?
                .ok_or(RosterError::NoSourceWeek {
                    target_start: target.week_start,
                    source_start,
                })?;
            if db.coverage_row_counts(&source.week_id)? == (0, 0) {
                return Err(RosterError::EmptySource(source_start));
            }

            let (ward_deleted, absences_deleted) = db.delete_ward_and_absences(&target.week_id)?;
            debug!(
                week_id = %target.week_id,
                ward_deleted,
                absences_deleted,
                "Cleared target coverage"
            );

            let mut summary = CarryForwardSummary::default();
            let shift = target.week_start - source.week_start;

            for (doctor_id, date) in db.list_ward_days(&source.week_id)? {
                let date = date + shift;
                for slot in Slot::ALL {
                    let admissions = db.admissions_doctor(&target.week_id, date, slot)?;
                    if self.collision.blocks(admissions.as_deref(), &doctor_id) {
                        summary.skipped_due_to_admissions += 1;
                        continue;
                    }
                    db.insert_slot_assignment(
                        &target.week_id,
                        &SlotAssignment::new(date, slot, doctor_id.as_str(), Role::Ward),
                    )?;
                    summary.ward_inserted += 1;
                }
            }

            for absence in db.list_absence_days(&source.week_id)? {
                let date = absence.date + shift;
                for slot in Slot::ALL {
                    let projected = Absence::new(
                        date,
                        slot,
                        absence.doctor_id.as_str(),
                        absence.reason,
                        absence.note.clone(),
                    );
                    if db.insert_absence(&target.week_id, &projected)? {
                        summary.absences_inserted += 1;
                    }
                }
            }

            db.touch_week(&target.week_id)?;
            ChangeLog::new(db).append(
                Some(&target.week_id),
                ChangeAction::CopyForward,
                &actor.identity,
                &json!({
                    "source_week_id": source.week_id,
                    "source_week_start": source.week_start,
                    "collision": self.collision,
                    "summary": summary,
                }),
            )?;

            info!(
                week_id = %target.week_id,
                source_week_id = %source.week_id,
                ward_inserted = summary.ward_inserted,
                absences_inserted = summary.absences_inserted,
                skipped = summary.skipped_due_to_admissions,
                actor = %actor.identity,
                "Copied previous week forward"
            );
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AbsenceReason, Week, WeekSchedule};
    use crate::workflow::test_support::*;
    use crate::workflow::ErrorKind;

    struct Fixture {
        db: Database,
        source: Week,
        target: Week,
        doctors: Vec<String>,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let doctors = add_doctors(&db, 3);
        let source = db
            .insert_week_if_absent(&Week::new(date(2024, 9, 2)).unwrap())
            .unwrap();
        let target = db
            .insert_week_if_absent(&Week::new(date(2024, 9, 9)).unwrap())
            .unwrap();
        Fixture {
            db,
            source,
            target,
            doctors,
        }
    }

    fn ward(date: chrono::NaiveDate, slot: Slot, doctor_id: &str) -> SlotAssignment {
        SlotAssignment::new(date, slot, doctor_id, Role::Ward)
    }

    #[test]
    fn test_same_doctor_admissions_skips_one_slot() {
        let f = setup();
        let d = f.doctors[0].as_str();
        let source_schedule = WeekSchedule::new(
            f.source.week_start,
            vec![ward(date(2024, 9, 3), Slot::Am, d)],
            vec![],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.source.week_id, &source_schedule).unwrap();
        f.db.insert_slot_assignment(
            &f.target.week_id,
            &SlotAssignment::new(date(2024, 9, 10), Slot::Am, d, Role::Admissions),
        )
        .unwrap();

        let summary = Roster::new(&f.db)
            .copy_week_forward(&planner(), &f.target.week_id)
            .unwrap();
        assert_eq!(
            summary,
            CarryForwardSummary {
                ward_inserted: 1,
                absences_inserted: 0,
                skipped_due_to_admissions: 1,
            }
        );

        let rows = f.db.list_slot_assignments(&f.target.week_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&ward(date(2024, 9, 10), Slot::Pm, d)));
    }

    #[test]
    fn test_any_admissions_policy_blocks_other_doctors() {
        let f = setup();
        let (d, other) = (f.doctors[0].as_str(), f.doctors[1].as_str());
        let source_schedule = WeekSchedule::new(
            f.source.week_start,
            vec![ward(date(2024, 9, 3), Slot::Pm, d)],
            vec![],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.source.week_id, &source_schedule).unwrap();
        f.db.insert_slot_assignment(
            &f.target.week_id,
            &SlotAssignment::new(date(2024, 9, 10), Slot::Am, other, Role::Admissions),
        )
        .unwrap();

        let same_doctor = Roster::new(&f.db)
            .copy_week_forward(&planner(), &f.target.week_id)
            .unwrap();
        assert_eq!(same_doctor.skipped_due_to_admissions, 0);
        assert_eq!(same_doctor.ward_inserted, 2);

        let any = Roster::new(&f.db)
            .with_collision_policy(CollisionPolicy::AnyAdmissions)
            .copy_week_forward(&planner(), &f.target.week_id)
            .unwrap();
        assert_eq!(any.skipped_due_to_admissions, 1);
        assert_eq!(any.ward_inserted, 1);
    }

    #[test]
    fn test_absences_are_projected_and_existing_coverage_replaced() {
        let f = setup();
        let (d, e) = (f.doctors[0].as_str(), f.doctors[1].as_str());
        let source_schedule = WeekSchedule::new(
            f.source.week_start,
            vec![],
            vec![
                Absence::new(date(2024, 9, 4), Slot::Am, d, AbsenceReason::Vacation, Some("trip".into())),
                Absence::new(date(2024, 9, 4), Slot::Pm, d, AbsenceReason::Vacation, Some("trip".into())),
            ],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.source.week_id, &source_schedule).unwrap();

        // Stale target coverage is wiped, admissions survive
        let target_schedule = WeekSchedule::new(
            f.target.week_start,
            vec![
                ward(date(2024, 9, 12), Slot::Am, e),
                SlotAssignment::new(date(2024, 9, 11), Slot::Am, d, Role::Admissions),
            ],
            vec![],
        )
        .unwrap();
        f.db.replace_week_schedule(&f.target.week_id, &target_schedule).unwrap();

        let summary = Roster::new(&f.db)
            .copy_week_forward(&planner(), &f.target.week_id)
            .unwrap();
        assert_eq!(summary.absences_inserted, 2);
        assert_eq!(summary.ward_inserted, 0);

        let absences = f.db.list_absences(&f.target.week_id).unwrap();
        assert_eq!(absences.len(), 2);
        assert!(absences.iter().all(|a| a.date == date(2024, 9, 11) && a.note.as_deref() == Some("trip")));

        let assignments = f.db.list_slot_assignments(&f.target.week_id).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].role, Role::Admissions);
    }

    #[test]
    fn test_missing_or_empty_source() {
        let f = setup();
        let roster = Roster::new(&f.db);

        let err = roster.copy_week_forward(&planner(), &f.source.week_id).unwrap_err();
        assert!(matches!(err, RosterError::NoSourceWeek { .. }));

        let err = roster.copy_week_forward(&planner(), &f.target.week_id).unwrap_err();
        assert!(matches!(err, RosterError::EmptySource(_)));
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_approved_target_is_locked() {
        let f = setup();
        f.db.mark_week_approved(&f.target.week_id, "2024-09-01T00:00:00Z", "chief")
            .unwrap();
        let err = Roster::new(&f.db)
            .copy_week_forward(&planner(), &f.target.week_id)
            .unwrap_err();
        assert!(matches!(err, RosterError::WeekLocked(_)));
    }
}
