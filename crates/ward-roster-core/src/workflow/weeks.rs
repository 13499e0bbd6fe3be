//! Week lifecycle, schedule saves and editor loading.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info};

use super::{load_week, Actor, Permission, Roster, RosterError, RosterResult};
use crate::audit::{ChangeAction, ChangeLog};
use crate::db::Database;
use crate::editor::ScheduleEditor;
use crate::models::{Absence, SlotAssignment, Week, WeekSchedule};

impl<'a> Roster<'a> {
    /// Create the draft week starting on `monday`, or return the existing one.
    pub fn create_week(&self, actor: &Actor, monday: NaiveDate) -> RosterResult<Week> {
        actor.require(Permission::EditSchedule)?;
        let candidate = Week::new(monday)?;

        self.db.write_transaction(|db| {
            let stored = db.insert_week_if_absent(&candidate)?;
            if stored.week_id == candidate.week_id {
                ChangeLog::new(db).append(
                    Some(&stored.week_id),
                    ChangeAction::CreateWeek,
                    &actor.identity,
                    &json!({ "week_start": stored.week_start }),
                )?;
                info!(week_id = %stored.week_id, week_start = %monday, actor = %actor.identity, "Week created");
            } else {
                debug!(week_id = %stored.week_id, week_start = %monday, "Week already exists");
            }
            Ok(stored)
        })
    }

    /// Delete a draft week with all its rows.
    pub fn delete_week(&self, actor: &Actor, week_id: &str) -> RosterResult<()> {
        actor.require(Permission::EditSchedule)?;

        self.db.write_transaction(|db| {
            let week = load_week(db, week_id)?;
            if !week.is_draft() {
                return Err(RosterError::WeekLocked(week.week_start));
            }
            db.delete_week(&week.week_id)?;
            ChangeLog::new(db).append(
                Some(&week.week_id),
                ChangeAction::DeleteWeek,
                &actor.identity,
                &json!({ "week_start": week.week_start }),
            )?;
            info!(week_id = %week.week_id, actor = %actor.identity, "Week deleted");
            Ok(())
        })
    }

    pub fn get_week(&self, week_id: &str) -> RosterResult<Week> {
        load_week(self.db, week_id)
    }

    /// The week starting on `week_start`, if created.
    pub fn find_week(&self, week_start: NaiveDate) -> RosterResult<Option<Week>> {
        Ok(self.db.get_week_by_start(week_start)?)
    }

    /// Weeks whose Monday lies in `from..=to`.
    pub fn list_weeks(&self, from: NaiveDate, to: NaiveDate) -> RosterResult<Vec<Week>> {
        Ok(self.db.list_weeks_between(from, to)?)
    }

    /// Replace a draft week's assignments and absences.
    pub fn save_week_schedule(
        &self,
        actor: &Actor,
        week_id: &str,
        assignments: Vec<SlotAssignment>,
        absences: Vec<Absence>,
    ) -> RosterResult<()> {
        actor.require(Permission::EditSchedule)?;
        self.replace_schedule(actor, week_id, |week| {
            Ok(WeekSchedule::new(week.week_start, assignments, absences)?)
        })
    }

    /// Save an editor's working copy and clear its dirty flag.
    pub fn save_editor(&self, actor: &Actor, editor: &mut ScheduleEditor) -> RosterResult<()> {
        actor.require(Permission::EditSchedule)?;
        if editor.is_locked() {
            return Err(RosterError::WeekLocked(editor.week_start()));
        }

        let schedule = editor.to_schedule()?;
        self.replace_schedule(actor, editor.week_id(), |week| {
            if week.week_start != schedule.week_start() {
                return Err(RosterError::MalformedPayload(format!(
                    "editor is for the week starting {}, stored week starts {}",
                    schedule.week_start(),
                    week.week_start
                )));
            }
            Ok(schedule)
        })?;
        editor.mark_saved();
        Ok(())
    }

    /// Stored schedule of a week as the editor sees it, with conflicting rows
    /// reconciled.
    pub fn load_schedule(&self, week_id: &str) -> RosterResult<WeekSchedule> {
        Ok(self.open_editor(week_id)?.to_schedule()?)
    }

    /// Editor over the stored rows of a week. Approved weeks open locked.
    pub fn open_editor(&self, week_id: &str) -> RosterResult<ScheduleEditor> {
        let week = load_week(self.db, week_id)?;
        let assignments = self.db.list_slot_assignments(&week.week_id)?;
        let absences = self.db.list_absences(&week.week_id)?;
        Ok(ScheduleEditor::load(&week, &assignments, &absences)?)
    }

    fn replace_schedule<F>(&self, actor: &Actor, week_id: &str, build: F) -> RosterResult<()>
    where
        F: FnOnce(&Week) -> RosterResult<WeekSchedule>,
    {
        self.db.write_transaction(|db| {
            let week = load_week(db, week_id)?;
            if !week.is_draft() {
                return Err(RosterError::WeekLocked(week.week_start));
            }

            let schedule = build(&week)?;
            check_doctors_exist(db, &schedule)?;
            db.replace_week_schedule(&week.week_id, &schedule)?;
            db.touch_week(&week.week_id)?;

            ChangeLog::new(db).append(
                Some(&week.week_id),
                ChangeAction::SaveSchedule,
                &actor.identity,
                &json!({
                    "assignments": schedule.assignments(),
                    "absences": schedule.absences(),
                }),
            )?;
            info!(
                week_id = %week.week_id,
                assignments = schedule.assignments().len(),
                absences = schedule.absences().len(),
                actor = %actor.identity,
                "Schedule saved"
            );
            Ok(())
        })
    }
}

fn check_doctors_exist(db: &Database, schedule: &WeekSchedule) -> RosterResult<()> {
    let doctor_ids: BTreeSet<&str> = schedule
        .assignments()
        .iter()
        .map(|a| a.doctor_id.as_str())
        .chain(schedule.absences().iter().map(|a| a.doctor_id.as_str()))
        .collect();

    for doctor_id in doctor_ids {
        if db.get_doctor(doctor_id)?.is_none() {
            return Err(RosterError::MalformedPayload(format!(
                "unknown doctor {}",
                doctor_id
            )));
        }
    }
    Ok(())
}
