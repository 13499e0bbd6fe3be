//! One business day of the editor, in unified or detailed granularity.
//!
//! A unified day holds one ward set and one absence map shared by AM and PM,
//! plus the two admissions doctors. Its per-slot view adds the opposite slot's
//! admissions doctor to the ward set unless that doctor is admissions or absent
//! in the slot itself. A detailed day stores an explicit `SlotState` per slot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::slot::{AbsenceEntry, SlotState};
use crate::models::{AbsenceReason, Slot};

/// Shared AM/PM values of a day edited as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnifiedDay {
    pub(crate) admissions: [Option<String>; 2],
    pub(crate) ward: BTreeSet<String>,
    pub(crate) absences: BTreeMap<String, AbsenceEntry>,
}

impl UnifiedDay {
    pub fn admissions(&self, slot: Slot) -> Option<&str> {
        self.admissions[slot.index()].as_deref()
    }

    pub fn ward(&self) -> &BTreeSet<String> {
        &self.ward
    }

    pub fn absences(&self) -> &BTreeMap<String, AbsenceEntry> {
        &self.absences
    }

    fn holds_admissions(&self, doctor_id: &str) -> bool {
        self.admissions.iter().flatten().any(|d| d == doctor_id)
    }

    /// Effective state of one slot.
    pub fn slot_state(&self, slot: Slot) -> SlotState {
        let own = &self.admissions[slot.index()];
        let opposite = &self.admissions[slot.opposite().index()];

        let mut ward = self.ward.clone();
        if let Some(doctor_id) = opposite {
            ward.insert(doctor_id.clone());
        }
        if let Some(doctor_id) = own {
            ward.remove(doctor_id);
        }
        ward.retain(|d| !self.absences.contains_key(d));

        SlotState {
            admissions: own.clone(),
            ward,
            absences: self.absences.clone(),
        }
    }

    /// Callers promote the day first when the doctor is absent.
    fn set_admissions(&mut self, slot: Slot, doctor_id: Option<&str>) {
        if let Some(doctor_id) = doctor_id {
            self.ward.remove(doctor_id);
        }
        self.admissions[slot.index()] = doctor_id.map(str::to_string);
    }

    fn toggle_ward(&mut self, doctor_id: &str) {
        if self.ward.remove(doctor_id) {
            return;
        }
        if !self.holds_admissions(doctor_id) && !self.absences.contains_key(doctor_id) {
            self.ward.insert(doctor_id.to_string());
        }
    }

    fn set_absence(&mut self, doctor_id: &str, entry: AbsenceEntry) {
        self.ward.remove(doctor_id);
        for admissions in self.admissions.iter_mut() {
            if admissions.as_deref() == Some(doctor_id) {
                *admissions = None;
            }
        }
        self.absences.insert(doctor_id.to_string(), entry);
    }

    fn toggle_absence(&mut self, doctor_id: &str, reason: AbsenceReason) {
        match self.absences.get(doctor_id) {
            Some(entry) if entry.reason == reason => {
                self.absences.remove(doctor_id);
            }
            _ => self.set_absence(doctor_id, AbsenceEntry::new(reason)),
        }
    }

    /// Collapse an AM/PM pair onto AM's ward and absences.
    ///
    /// PM admissions held by a doctor absent in the morning is dropped.
    fn collapse(am: &SlotState, pm: &SlotState) -> Self {
        let absences = am.absences.clone();
        let mut admissions = [am.admissions.clone(), pm.admissions.clone()];
        if admissions[1]
            .as_ref()
            .map_or(false, |d| absences.contains_key(d))
        {
            admissions[1] = None;
        }

        let mut ward = am.ward.clone();
        for doctor_id in admissions.iter().flatten() {
            ward.remove(doctor_id);
        }

        UnifiedDay {
            admissions,
            ward,
            absences,
        }
    }

    /// The unified value reproducing both slots, if there is one.
    fn collapse_exact(am: &SlotState, pm: &SlotState) -> Option<Self> {
        let candidate = Self::collapse(am, pm);
        (candidate.slot_state(Slot::Am) == *am && candidate.slot_state(Slot::Pm) == *pm)
            .then_some(candidate)
    }
}

/// Editing granularity of one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DayPlan {
    Unified(UnifiedDay),
    Detailed { slots: [SlotState; 2] },
}

impl Default for DayPlan {
    fn default() -> Self {
        DayPlan::Unified(UnifiedDay::default())
    }
}

impl DayPlan {
    /// Build a day from explicit slot states, unified when that is lossless.
    pub fn from_slots(am: SlotState, pm: SlotState) -> Self {
        match UnifiedDay::collapse_exact(&am, &pm) {
            Some(unified) => DayPlan::Unified(unified),
            None => DayPlan::Detailed { slots: [am, pm] },
        }
    }

    pub fn is_detailed(&self) -> bool {
        matches!(self, DayPlan::Detailed { .. })
    }

    /// Effective state of one slot.
    pub fn slot(&self, slot: Slot) -> SlotState {
        match self {
            DayPlan::Unified(day) => day.slot_state(slot),
            DayPlan::Detailed { slots } => slots[slot.index()].clone(),
        }
    }

    pub fn slots(&self) -> [SlotState; 2] {
        [self.slot(Slot::Am), self.slot(Slot::Pm)]
    }

    /// True when AM and PM cannot be expressed as one whole-day value.
    ///
    /// Always false for a unified day. For a detailed day this is exactly the
    /// condition under which demoting needs confirmation.
    pub fn has_slot_differences(&self) -> bool {
        match self {
            DayPlan::Unified(_) => false,
            DayPlan::Detailed { slots: [am, pm] } => UnifiedDay::collapse_exact(am, pm).is_none(),
        }
    }

    /// Whether demoting would change either slot's effective state.
    pub fn demotion_discards_data(&self) -> bool {
        self.has_slot_differences()
    }

    /// Switch to per-slot granularity, keeping current per-slot values.
    pub fn promote(&mut self) {
        if let DayPlan::Unified(day) = self {
            let slots = [day.slot_state(Slot::Am), day.slot_state(Slot::Pm)];
            *self = DayPlan::Detailed { slots };
        }
    }

    /// Switch back to unified values, collapsing onto AM.
    pub fn demote(&mut self) {
        if let DayPlan::Detailed { slots } = self {
            let unified = UnifiedDay::collapse(&slots[0], &slots[1]);
            *self = DayPlan::Unified(unified);
        }
    }

    fn with_detailed_slot(&mut self, slot: Slot, edit: impl FnOnce(&mut SlotState)) {
        self.promote();
        if let DayPlan::Detailed { slots } = self {
            edit(&mut slots[slot.index()]);
        }
    }

    /// Per-slot admissions. A unified day stays unified unless the doctor is
    /// absent, in which case it is promoted so the other slot keeps the absence.
    pub fn set_admissions(&mut self, slot: Slot, doctor_id: Option<&str>) {
        let stays_unified = match self {
            DayPlan::Unified(day) => doctor_id.map_or(true, |d| !day.absences.contains_key(d)),
            DayPlan::Detailed { .. } => false,
        };
        if stays_unified {
            if let DayPlan::Unified(day) = self {
                day.set_admissions(slot, doctor_id);
            }
        } else {
            self.with_detailed_slot(slot, |state| state.set_admissions(doctor_id));
        }
    }

    /// Per-slot ward toggle. A unified day is promoted first.
    pub fn toggle_ward(&mut self, slot: Slot, doctor_id: &str) {
        self.with_detailed_slot(slot, |state| state.toggle_ward(doctor_id));
    }

    /// Per-slot absence. A unified day is promoted first.
    pub fn set_absence(&mut self, slot: Slot, doctor_id: &str, entry: AbsenceEntry) {
        self.with_detailed_slot(slot, |state| state.set_absence(doctor_id, entry));
    }

    pub fn toggle_absence(&mut self, slot: Slot, doctor_id: &str, reason: AbsenceReason) {
        self.with_detailed_slot(slot, |state| state.toggle_absence(doctor_id, reason));
    }

    pub fn clear_absence(&mut self, slot: Slot, doctor_id: &str) {
        if self.slot(slot).absences.contains_key(doctor_id) {
            self.with_detailed_slot(slot, |state| state.clear_absence(doctor_id));
        }
    }

    /// Ward toggle applied to AM and PM together.
    ///
    /// On a detailed day a doctor on ward in both slots is removed from both,
    /// otherwise they are added wherever the slot allows it.
    pub fn toggle_day_ward(&mut self, doctor_id: &str) {
        match self {
            DayPlan::Unified(day) => day.toggle_ward(doctor_id),
            DayPlan::Detailed { slots } => {
                if slots.iter().all(|s| s.ward.contains(doctor_id)) {
                    for state in slots.iter_mut() {
                        state.ward.remove(doctor_id);
                    }
                } else {
                    for state in slots.iter_mut() {
                        state.join_ward(doctor_id);
                    }
                }
            }
        }
    }

    /// Absence toggle applied to AM and PM together.
    pub fn toggle_day_absence(&mut self, doctor_id: &str, reason: AbsenceReason) {
        match self {
            DayPlan::Unified(day) => day.toggle_absence(doctor_id, reason),
            DayPlan::Detailed { slots } => {
                let already = slots.iter().all(|s| {
                    s.absences
                        .get(doctor_id)
                        .map_or(false, |entry| entry.reason == reason)
                });
                for state in slots.iter_mut() {
                    if already {
                        state.clear_absence(doctor_id);
                    } else {
                        state.set_absence(doctor_id, AbsenceEntry::new(reason));
                    }
                }
            }
        }
    }

    /// Mark the doctor absent for the whole day.
    pub fn set_day_absence(&mut self, doctor_id: &str, entry: AbsenceEntry) {
        match self {
            DayPlan::Unified(day) => day.set_absence(doctor_id, entry),
            DayPlan::Detailed { slots } => {
                for state in slots.iter_mut() {
                    state.set_absence(doctor_id, entry.clone());
                }
            }
        }
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        if !self.slot(slot).is_empty() {
            self.with_detailed_slot(slot, SlotState::clear);
        }
    }

    /// Reset to the empty unified day.
    pub fn clear(&mut self) {
        *self = DayPlan::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DoctorDuty;

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn unified_day() -> DayPlan {
        // X on admissions AM, Y on admissions PM, Z on ward all day
        let mut day = DayPlan::default();
        day.set_admissions(Slot::Am, Some("x"));
        day.set_admissions(Slot::Pm, Some("y"));
        day.toggle_day_ward("z");
        day
    }

    #[test]
    fn test_opposite_admissions_joins_ward() {
        let day = unified_day();
        assert!(!day.is_detailed());

        let am = day.slot(Slot::Am);
        assert_eq!(am.admissions(), Some("x"));
        assert_eq!(am.ward(), &ids(&["y", "z"]));

        let pm = day.slot(Slot::Pm);
        assert_eq!(pm.admissions(), Some("y"));
        assert_eq!(pm.ward(), &ids(&["x", "z"]));
        assert!(am.is_consistent() && pm.is_consistent());
    }

    #[test]
    fn test_implicit_ward_suppressed_when_admissions_both_slots() {
        let mut day = DayPlan::default();
        day.set_admissions(Slot::Am, Some("x"));
        day.set_admissions(Slot::Pm, Some("x"));
        assert!(day.slot(Slot::Am).ward().is_empty());
        assert!(day.slot(Slot::Pm).ward().is_empty());
    }

    #[test]
    fn test_implicit_ward_suppressed_when_absent() {
        let mut day = unified_day();
        day.toggle_day_absence("y", AbsenceReason::PostCall);

        // Absence wins: Y loses PM admissions and the implicit AM ward seat
        let am = day.slot(Slot::Am);
        let pm = day.slot(Slot::Pm);
        assert!(!am.ward().contains("y"));
        assert_eq!(pm.admissions(), None);
        assert!(pm.absences().contains_key("y"));
    }

    #[test]
    fn test_day_ward_toggle_disabled_for_admissions_doctor() {
        let mut day = unified_day();
        let before = day.clone();
        day.toggle_day_ward("x");
        assert_eq!(day, before);
    }

    #[test]
    fn test_day_toggles_are_involutions() {
        let mut day = unified_day();
        let before = day.clone();

        day.toggle_day_ward("w");
        day.toggle_day_ward("w");
        assert_eq!(day, before);

        day.toggle_day_absence("w", AbsenceReason::Vacation);
        day.toggle_day_absence("w", AbsenceReason::Vacation);
        assert_eq!(day, before);
    }

    #[test]
    fn test_promote_preserves_slot_values() {
        let mut day = unified_day();
        let before = day.slots();

        day.promote();
        assert!(day.is_detailed());
        assert_eq!(day.slots(), before);
        assert!(!day.has_slot_differences());
        assert!(!day.demotion_discards_data());
    }

    #[test]
    fn test_per_slot_edit_promotes_and_creates_differences() {
        let mut day = unified_day();
        day.toggle_ward(Slot::Pm, "z");

        assert!(day.is_detailed());
        assert!(day.has_slot_differences());
        assert!(day.demotion_discards_data());
        assert!(day.slot(Slot::Am).ward().contains("z"));
        assert!(!day.slot(Slot::Pm).ward().contains("z"));
    }

    #[test]
    fn test_demote_keeps_morning_values() {
        let mut day = unified_day();
        day.set_absence(Slot::Pm, "w", AbsenceEntry::new(AbsenceReason::Training));
        assert!(day.has_slot_differences());

        day.demote();
        assert!(!day.is_detailed());
        assert!(!day.slot(Slot::Pm).absences().contains_key("w"));
        assert_eq!(day.slot(Slot::Pm).ward(), &ids(&["x", "z"]));
    }

    #[test]
    fn test_detailed_day_toggles_apply_to_both_slots() {
        let mut day = unified_day();
        day.promote();

        day.toggle_day_ward("w");
        assert!(day.slot(Slot::Am).ward().contains("w"));
        assert!(day.slot(Slot::Pm).ward().contains("w"));
        day.toggle_day_ward("w");
        assert!(!day.slot(Slot::Am).ward().contains("w"));

        day.toggle_day_absence("x", AbsenceReason::Other);
        assert_eq!(day.slot(Slot::Am).admissions(), None);
        assert!(!day.slot(Slot::Pm).ward().contains("x"));
        day.toggle_day_absence("x", AbsenceReason::Other);
        assert!(day.slot(Slot::Am).absences().is_empty());
    }

    #[test]
    fn test_from_slots_picks_granularity() {
        let day = unified_day();
        let [am, pm] = day.slots();
        assert_eq!(DayPlan::from_slots(am.clone(), pm.clone()), day);

        let mut pm_without_x = pm;
        pm_without_x.ward.remove("x");
        let detailed = DayPlan::from_slots(am, pm_without_x.clone());
        assert!(detailed.is_detailed());
        assert_eq!(detailed.slot(Slot::Pm), pm_without_x);
    }

    #[test]
    fn test_admissions_keeps_other_slot_absence() {
        let mut day = DayPlan::default();
        day.set_day_absence("d", AbsenceEntry::with_note(AbsenceReason::Vacation, Some("ski".into())));
        day.set_admissions(Slot::Am, Some("d"));

        assert!(day.is_detailed());
        let am = day.slot(Slot::Am);
        let pm = day.slot(Slot::Pm);
        assert_eq!(am.duty_of("d"), DoctorDuty::Admissions);
        assert_eq!(pm.duty_of("d"), DoctorDuty::Absent(AbsenceReason::Vacation));
        assert_eq!(pm.absences()["d"].note.as_deref(), Some("ski"));
        assert!(!pm.ward().contains("d"));
    }

    #[test]
    fn test_admissions_for_present_doctor_stays_unified() {
        let mut day = DayPlan::default();
        day.set_day_absence("e", AbsenceEntry::new(AbsenceReason::Training));
        day.set_admissions(Slot::Am, Some("d"));
        assert!(!day.is_detailed());
        assert_eq!(day.slot(Slot::Pm).duty_of("e"), DoctorDuty::Absent(AbsenceReason::Training));
    }

    #[test]
    fn test_differences_flag_matches_demotion_check() {
        // Lone AM admissions: collapsing would seat x on PM ward
        let mut am = SlotState::default();
        am.set_admissions(Some("x"));
        let day = DayPlan::Detailed {
            slots: [am, SlotState::default()],
        };
        assert!(day.has_slot_differences());
        assert!(day.demotion_discards_data());

        let mut day = unified_day();
        day.promote();
        assert_eq!(day.has_slot_differences(), day.demotion_discards_data());
        assert!(!unified_day().has_slot_differences());
    }

    #[test]
    fn test_clear_slot_and_day() {
        let mut day = unified_day();
        day.clear_slot(Slot::Am);
        assert!(day.slot(Slot::Am).is_empty());
        assert_eq!(day.slot(Slot::Pm).admissions(), Some("y"));

        day.clear();
        assert!(!day.is_detailed());
        assert!(day.slots().iter().all(SlotState::is_empty));
    }
}
