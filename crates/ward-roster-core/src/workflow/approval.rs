//! Approval State Machine.

use serde_json::json;
use tracing::{info, warn};

use super::validator::validate_stored;
use super::{load_week, now, Actor, Permission, Roster, RosterError, RosterResult};
use crate::audit::{ChangeAction, ChangeLog};
use crate::models::{Week, WeekStatus};

impl<'a> Roster<'a> {
    /// Move a draft week to approved.
    ///
    /// `has_unsaved_changes` is the caller's dirty flag; approval is refused
    /// while it is set. Validation runs against the stored rows under the
    /// write lock.
    pub fn approve_week(
        &self,
        actor: &Actor,
        week_id: &str,
        has_unsaved_changes: bool,
    ) -> RosterResult<Week> {
        actor.require(Permission::ApproveSchedule)?;
        if has_unsaved_changes {
            return Err(RosterError::UnsavedChanges(week_id.to_string()));
        }

        self.db.write_transaction(|db| {
            let week = load_week(db, week_id)?;
            if !week.status.can_transition_to(&WeekStatus::Approved) {
                return Err(RosterError::WeekLocked(week.week_start));
            }

            let validation = validate_stored(db, &week)?;
            if !validation.is_ok() {
                warn!(
                    week_id = %week.week_id,
                    missing = validation.missing.len(),
                    "Approval refused"
                );
                return Err(RosterError::ApprovalPrecondition {
                    week_start: week.week_start,
                    missing: validation.missing,
                });
            }

            let approved_at = now();
            db.mark_week_approved(&week.week_id, &approved_at, &actor.identity)?;
            ChangeLog::new(db).append(
                Some(&week.week_id),
                ChangeAction::ApproveWeek,
                &actor.identity,
                &json!({ "week_start": week.week_start, "approved_at": approved_at }),
            )?;

            info!(week_id = %week.week_id, week_start = %week.week_start, actor = %actor.identity, "Week approved");
            load_week(db, week_id)
        })
    }

    /// Return a week to draft and clear its approval metadata.
    ///
    /// Reverting a draft week succeeds without a change log entry.
    pub fn revert_week(&self, actor: &Actor, week_id: &str) -> RosterResult<Week> {
        actor.require(Permission::ApproveSchedule)?;

        self.db.write_transaction(|db| {
            let week = load_week(db, week_id)?;
            db.mark_week_draft(&week.week_id)?;

            if week.is_approved() {
                ChangeLog::new(db).append(
                    Some(&week.week_id),
                    ChangeAction::RevertWeek,
                    &actor.identity,
                    &json!({
                        "week_start": week.week_start,
                        "approved_at": week.approved_at,
                        "approved_by": week.approved_by,
                    }),
                )?;
                info!(week_id = %week.week_id, actor = %actor.identity, "Week reverted to draft");
            }

            load_week(db, week_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Role, Slot, SlotAssignment};
    use crate::workflow::test_support::*;
    use crate::workflow::ErrorKind;

    fn setup() -> (Database, Week, Vec<String>) {
        let db = Database::open_in_memory().unwrap();
        let doctors = add_doctors(&db, 10);
        let week = db
            .insert_week_if_absent(&Week::new(date(2024, 9, 2)).unwrap())
            .unwrap();
        (db, week, doctors)
    }

    fn fill(db: &Database, week: &Week, doctors: &[String]) {
        for assignment in full_admissions(week, doctors) {
            db.insert_slot_assignment(&week.week_id, &assignment).unwrap();
        }
    }

    #[test]
    fn test_approve_complete_week() {
        let (db, week, doctors) = setup();
        fill(&db, &week, &doctors);
        let roster = Roster::new(&db);

        let approved = roster.approve_week(&planner(), &week.week_id, false).unwrap();
        assert_eq!(approved.status, WeekStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("planner"));
        assert!(approved.approved_at.is_some());
    }

    #[test]
    fn test_approve_requires_permission_first() {
        let (db, _week, _) = setup();
        let roster = Roster::new(&db);
        let editor_only = Actor::new("editor", [Permission::EditSchedule]);

        // Authorization is checked before the week is even looked up
        let err = roster.approve_week(&editor_only, "no-such-week", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_unsaved_changes_block_approval() {
        let (db, week, doctors) = setup();
        fill(&db, &week, &doctors);
        let roster = Roster::new(&db);

        let err = roster.approve_week(&planner(), &week.week_id, true).unwrap_err();
        assert!(matches!(err, RosterError::UnsavedChanges(_)));
        assert!(db.get_week(&week.week_id).unwrap().unwrap().is_draft());
    }

    #[test]
    fn test_incomplete_week_lists_all_missing_slots() {
        let (db, week, doctors) = setup();
        db.insert_slot_assignment(
            &week.week_id,
            &SlotAssignment::new(date(2024, 9, 2), Slot::Am, doctors[0].as_str(), Role::Admissions),
        )
        .unwrap();
        let roster = Roster::new(&db);

        match roster.approve_week(&planner(), &week.week_id, false) {
            Err(RosterError::ApprovalPrecondition { missing, .. }) => assert_eq!(missing.len(), 9),
            other => panic!("expected precondition failure, got {:?}", other),
        }
        assert!(db.get_week(&week.week_id).unwrap().unwrap().is_draft());
        assert!(db.list_changes().unwrap().is_empty());
    }

    #[test]
    fn test_approved_week_cannot_be_approved_again() {
        let (db, week, doctors) = setup();
        fill(&db, &week, &doctors);
        let roster = Roster::new(&db);
        roster.approve_week(&planner(), &week.week_id, false).unwrap();

        let err = roster.approve_week(&planner(), &week.week_id, false).unwrap_err();
        assert!(matches!(err, RosterError::WeekLocked(_)));
    }

    #[test]
    fn test_revert_clears_metadata() {
        let (db, week, doctors) = setup();
        fill(&db, &week, &doctors);
        let roster = Roster::new(&db);
        roster.approve_week(&planner(), &week.week_id, false).unwrap();

        let reverted = roster.revert_week(&planner(), &week.week_id).unwrap();
        assert_eq!(reverted.status, WeekStatus::Draft);
        assert!(reverted.approved_at.is_none());
        assert!(reverted.approved_by.is_none());

        // Reverting a draft is a no-op
        let again = roster.revert_week(&planner(), &week.week_id).unwrap();
        assert!(again.is_draft());
        assert_eq!(db.list_changes().unwrap().len(), 2);
    }

    #[test]
    fn test_revert_unknown_week() {
        let (db, _, _) = setup();
        let roster = Roster::new(&db);
        assert!(matches!(
            roster.revert_week(&planner(), "nope"),
            Err(RosterError::WeekNotFound(_))
        ));
    }
}
