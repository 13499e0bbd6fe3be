//! Slot Reconciliation Engine.
//!
//! An in-memory working copy of one week, keyed by business day. Every edit goes
//! through [`ScheduleEditor`], which rejects mutations on approved weeks, keeps
//! each slot mutually exclusive (see [`slot`]) and tracks whether the working
//! copy differs from what was last saved.
//!
//! ```text
//! edit ──► ScheduleEditor ──► DayPlan (unified | detailed) ──► SlotState
//!                │
//!                └── to_schedule() ──► WeekSchedule ──► save
//! ```

mod day;
mod slot;

pub use day::*;
pub use slot::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    business_days, is_business_day_of, Absence, AbsenceReason, Doctor, DomainError, Role, Slot,
    SlotAssignment, Week, WeekSchedule,
};

/// Editor errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Week starting {0} is approved and cannot be edited")]
    WeekLocked(NaiveDate),

    #[error("{date} is not a business day of the week starting {week_start}")]
    DateOutsideWeek {
        week_start: NaiveDate,
        date: NaiveDate,
    },

    #[error("Collapsing {0} to a single day value discards slot data; confirmation required")]
    ConfirmationRequired(NaiveDate),

    #[error(transparent)]
    Invariant(#[from] DomainError),
}

pub type EditResult<T> = Result<T, EditError>;

/// Working copy of one week's assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEditor {
    week_id: String,
    week_start: NaiveDate,
    locked: bool,
    dirty: bool,
    days: BTreeMap<NaiveDate, DayPlan>,
}

impl ScheduleEditor {
    /// Empty editor for a week: every active doctor off everywhere.
    pub fn new(week: &Week) -> Self {
        Self {
            week_id: week.week_id.clone(),
            week_start: week.week_start,
            locked: week.is_approved(),
            dirty: false,
            days: business_days(week.week_start)
                .into_iter()
                .map(|date| (date, DayPlan::default()))
                .collect(),
        }
    }

    /// Build an editor from stored rows.
    ///
    /// Rows that break per-slot exclusivity are reconciled with the edit
    /// precedence (absence wins, then admissions) and the editor starts dirty.
    pub fn load(week: &Week, assignments: &[SlotAssignment], absences: &[Absence]) -> EditResult<Self> {
        let mut editor = Self::new(week);
        let mut raw: BTreeMap<NaiveDate, [SlotState; 2]> = BTreeMap::new();
        let mut reconciled = false;

        for assignment in assignments {
            editor.check_date(assignment.date)?;
            let state = &mut raw.entry(assignment.date).or_default()[assignment.slot.index()];
            match assignment.role {
                Role::Admissions => {
                    if state.admissions.is_some() {
                        reconciled = true;
                    }
                    state.admissions = Some(assignment.doctor_id.clone());
                }
                Role::Ward => {
                    state.ward.insert(assignment.doctor_id.clone());
                }
            }
        }
        for absence in absences {
            editor.check_date(absence.date)?;
            let state = &mut raw.entry(absence.date).or_default()[absence.slot.index()];
            state.absences.insert(
                absence.doctor_id.clone(),
                AbsenceEntry::with_note(absence.reason, absence.note.clone()),
            );
        }

        for (date, [mut am, mut pm]) in raw {
            for state in [&mut am, &mut pm] {
                if !state.is_consistent() {
                    state.reconcile();
                    reconciled = true;
                }
            }
            editor.days.insert(date, DayPlan::from_slots(am, pm));
        }

        editor.dirty = reconciled;
        Ok(editor)
    }

    pub fn week_id(&self) -> &str {
        &self.week_id
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// True when the working copy has edits not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after a successful save.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayPlan> {
        self.days.get(&date)
    }

    pub fn days(&self) -> impl Iterator<Item = (&NaiveDate, &DayPlan)> {
        self.days.iter()
    }

    /// Effective state of one slot.
    pub fn slot(&self, date: NaiveDate, slot: Slot) -> Option<SlotState> {
        self.days.get(&date).map(|day| day.slot(slot))
    }

    pub fn has_slot_differences(&self, date: NaiveDate) -> bool {
        self.days
            .get(&date)
            .map_or(false, DayPlan::has_slot_differences)
    }

    pub fn is_detailed(&self, date: NaiveDate) -> bool {
        self.days.get(&date).map_or(false, DayPlan::is_detailed)
    }

    /// Active doctors implicitly off in a slot.
    pub fn off_doctors(&self, date: NaiveDate, slot: Slot, doctors: &[Doctor]) -> Vec<String> {
        let active = doctors
            .iter()
            .filter(|d| d.active)
            .map(|d| d.doctor_id.as_str());
        match self.days.get(&date) {
            Some(day) => day.slot(slot).off_doctors(active),
            None => Vec::new(),
        }
    }

    pub fn set_admissions(
        &mut self,
        date: NaiveDate,
        slot: Slot,
        doctor_id: Option<&str>,
    ) -> EditResult<bool> {
        self.edit(date, |day| day.set_admissions(slot, doctor_id))
    }

    pub fn toggle_ward(&mut self, date: NaiveDate, slot: Slot, doctor_id: &str) -> EditResult<bool> {
        self.edit(date, |day| day.toggle_ward(slot, doctor_id))
    }

    pub fn set_absence(
        &mut self,
        date: NaiveDate,
        slot: Slot,
        doctor_id: &str,
        entry: AbsenceEntry,
    ) -> EditResult<bool> {
        self.edit(date, |day| day.set_absence(slot, doctor_id, entry))
    }

    pub fn toggle_absence(
        &mut self,
        date: NaiveDate,
        slot: Slot,
        doctor_id: &str,
        reason: AbsenceReason,
    ) -> EditResult<bool> {
        self.edit(date, |day| day.toggle_absence(slot, doctor_id, reason))
    }

    pub fn clear_absence(&mut self, date: NaiveDate, slot: Slot, doctor_id: &str) -> EditResult<bool> {
        self.edit(date, |day| day.clear_absence(slot, doctor_id))
    }

    pub fn toggle_day_ward(&mut self, date: NaiveDate, doctor_id: &str) -> EditResult<bool> {
        self.edit(date, |day| day.toggle_day_ward(doctor_id))
    }

    pub fn toggle_day_absence(
        &mut self,
        date: NaiveDate,
        doctor_id: &str,
        reason: AbsenceReason,
    ) -> EditResult<bool> {
        self.edit(date, |day| day.toggle_day_absence(doctor_id, reason))
    }

    pub fn set_day_absence(
        &mut self,
        date: NaiveDate,
        doctor_id: &str,
        entry: AbsenceEntry,
    ) -> EditResult<bool> {
        self.edit(date, |day| day.set_day_absence(doctor_id, entry))
    }

    pub fn clear_slot(&mut self, date: NaiveDate, slot: Slot) -> EditResult<bool> {
        self.edit(date, |day| day.clear_slot(slot))
    }

    pub fn clear_day(&mut self, date: NaiveDate) -> EditResult<bool> {
        self.edit(date, DayPlan::clear)
    }

    /// Promote a unified day to per-slot values, or demote a detailed day back.
    ///
    /// Demoting a day whose slots cannot be represented as one value requires
    /// `confirm_discard`. Returns whether the day is detailed afterwards.
    pub fn toggle_detailed_mode(&mut self, date: NaiveDate, confirm_discard: bool) -> EditResult<bool> {
        let day = self.checked_day(date)?;
        if day.is_detailed() && day.demotion_discards_data() && !confirm_discard {
            return Err(EditError::ConfirmationRequired(date));
        }

        self.edit(date, |day| {
            if day.is_detailed() {
                day.demote();
            } else {
                day.promote();
            }
        })?;
        Ok(self.is_detailed(date))
    }

    /// Persistable rows of the working copy.
    pub fn to_schedule(&self) -> EditResult<WeekSchedule> {
        let mut assignments = Vec::new();
        let mut absences = Vec::new();

        for (date, day) in &self.days {
            for slot in Slot::ALL {
                let state = day.slot(slot);
                if let Some(doctor_id) = state.admissions() {
                    assignments.push(SlotAssignment::new(*date, slot, doctor_id, Role::Admissions));
                }
                for doctor_id in state.ward() {
                    assignments.push(SlotAssignment::new(*date, slot, doctor_id.as_str(), Role::Ward));
                }
                for (doctor_id, entry) in state.absences() {
                    absences.push(Absence::new(
                        *date,
                        slot,
                        doctor_id.as_str(),
                        entry.reason,
                        entry.note.clone(),
                    ));
                }
            }
        }

        Ok(WeekSchedule::new(self.week_start, assignments, absences)?)
    }

    fn check_date(&self, date: NaiveDate) -> EditResult<()> {
        if is_business_day_of(self.week_start, date) {
            Ok(())
        } else {
            Err(EditError::DateOutsideWeek {
                week_start: self.week_start,
                date,
            })
        }
    }

    fn checked_day(&self, date: NaiveDate) -> EditResult<&DayPlan> {
        if self.locked {
            return Err(EditError::WeekLocked(self.week_start));
        }
        self.check_date(date)?;
        self.days.get(&date).ok_or(EditError::DateOutsideWeek {
            week_start: self.week_start,
            date,
        })
    }

    /// Apply a mutation to one day; returns whether any slot changed.
    fn edit<F>(&mut self, date: NaiveDate, mutate: F) -> EditResult<bool>
    where
        F: FnOnce(&mut DayPlan),
    {
        let before = self.checked_day(date)?.slots();
        let day = self.days.entry(date).or_default();
        mutate(day);

        let changed = day.slots() != before;
        if changed {
            self.dirty = true;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekStatus;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn draft_week() -> Week {
        Week::new(date(2)).unwrap()
    }

    #[test]
    fn test_new_editor_is_empty_and_clean() {
        let editor = ScheduleEditor::new(&draft_week());
        assert!(!editor.is_dirty());
        assert!(!editor.is_locked());
        assert_eq!(editor.days().count(), 5);
        assert!(editor.to_schedule().unwrap().is_empty());
    }

    #[test]
    fn test_edits_set_dirty_only_on_change() {
        let mut editor = ScheduleEditor::new(&draft_week());

        assert!(editor.set_admissions(date(2), Slot::Am, Some("a")).unwrap());
        assert!(editor.is_dirty());
        editor.mark_saved();

        // Disabled ward toggle changes nothing
        assert!(!editor.toggle_ward(date(2), Slot::Am, "a").unwrap());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_locked_week_rejects_edits() {
        let mut week = draft_week();
        week.status = WeekStatus::Approved;
        let mut editor = ScheduleEditor::new(&week);

        assert_eq!(
            editor.set_admissions(date(2), Slot::Am, Some("a")),
            Err(EditError::WeekLocked(date(2)))
        );
        assert_eq!(
            editor.clear_day(date(3)),
            Err(EditError::WeekLocked(date(2)))
        );
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_date_outside_week_rejected() {
        let mut editor = ScheduleEditor::new(&draft_week());
        assert!(matches!(
            editor.toggle_day_ward(date(7), "a"),
            Err(EditError::DateOutsideWeek { .. })
        ));
    }

    #[test]
    fn test_demotion_requires_confirmation() {
        let mut editor = ScheduleEditor::new(&draft_week());
        editor.toggle_day_ward(date(4), "a").unwrap();
        editor.toggle_ward(date(4), Slot::Pm, "a").unwrap();
        assert!(editor.is_detailed(date(4)));
        assert!(editor.has_slot_differences(date(4)));

        assert_eq!(
            editor.toggle_detailed_mode(date(4), false),
            Err(EditError::ConfirmationRequired(date(4)))
        );
        assert!(editor.is_detailed(date(4)));

        assert_eq!(editor.toggle_detailed_mode(date(4), true), Ok(false));
        let pm = editor.slot(date(4), Slot::Pm).unwrap();
        assert!(pm.ward().contains("a"));
    }

    #[test]
    fn test_lossless_mode_switch_needs_no_confirmation() {
        let mut editor = ScheduleEditor::new(&draft_week());
        editor.toggle_day_ward(date(5), "a").unwrap();
        editor.mark_saved();

        assert_eq!(editor.toggle_detailed_mode(date(5), false), Ok(true));
        assert_eq!(editor.toggle_detailed_mode(date(5), false), Ok(false));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_load_round_trips_schedule() {
        let week = draft_week();
        let mut editor = ScheduleEditor::new(&week);
        editor.set_admissions(date(3), Slot::Am, Some("a")).unwrap();
        editor.set_admissions(date(3), Slot::Pm, Some("b")).unwrap();
        editor.toggle_day_ward(date(3), "c").unwrap();
        editor.toggle_absence(date(3), Slot::Pm, "d", AbsenceReason::PostCall).unwrap();
        let schedule = editor.to_schedule().unwrap();

        let loaded =
            ScheduleEditor::load(&week, schedule.assignments(), schedule.absences()).unwrap();
        assert!(!loaded.is_dirty());
        assert!(loaded.is_detailed(date(3)));
        assert!(!loaded.is_detailed(date(2)));
        assert_eq!(loaded.to_schedule().unwrap(), schedule);
    }

    #[test]
    fn test_load_reconciles_conflicting_rows() {
        let week = draft_week();
        let assignments = vec![
            SlotAssignment::new(date(3), Slot::Am, "a", Role::Admissions),
            SlotAssignment::new(date(3), Slot::Am, "b", Role::Ward),
        ];
        let absences = vec![
            Absence::new(date(3), Slot::Am, "a", AbsenceReason::Vacation, None),
            Absence::new(date(3), Slot::Am, "b", AbsenceReason::Training, None),
        ];

        let editor = ScheduleEditor::load(&week, &assignments, &absences).unwrap();
        assert!(editor.is_dirty());

        let am = editor.slot(date(3), Slot::Am).unwrap();
        assert_eq!(am.admissions(), None);
        assert!(am.ward().is_empty());
        assert_eq!(am.absences().len(), 2);
    }

    #[test]
    fn test_off_doctors_ignores_archived() {
        let mut editor = ScheduleEditor::new(&draft_week());
        let mut doctors = vec![
            Doctor::new("Dr. A".into()),
            Doctor::new("Dr. B".into()),
            Doctor::new("Dr. C".into()),
        ];
        doctors[2].active = false;
        let a = doctors[0].doctor_id.clone();
        let b = doctors[1].doctor_id.clone();

        editor.set_admissions(date(2), Slot::Am, Some(&a)).unwrap();
        assert_eq!(editor.off_doctors(date(2), Slot::Am, &doctors), vec![b.clone()]);
        // A is implicitly on PM ward in unified mode
        assert_eq!(editor.off_doctors(date(2), Slot::Pm, &doctors), vec![b]);
    }
}
