//! Per-slot assignment state and the reconciliation rules applied to it.
//!
//! Precedence inside one slot:
//! 1. setting admissions removes the doctor from ward and absences;
//! 2. marking a doctor absent removes them from ward and clears admissions if
//!    they held it;
//! 3. ward membership cannot be toggled on for the admissions doctor or an
//!    absent doctor (the toggle is a no-op);
//! 4. everyone else in the active roster is implicitly off.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::AbsenceReason;

/// Absence reason plus optional free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AbsenceEntry {
    pub reason: AbsenceReason,
    pub note: Option<String>,
}

impl AbsenceEntry {
    pub fn new(reason: AbsenceReason) -> Self {
        Self { reason, note: None }
    }

    pub fn with_note(reason: AbsenceReason, note: Option<String>) -> Self {
        Self { reason, note }
    }
}

/// What a doctor is doing in one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorDuty {
    Admissions,
    Ward,
    Absent(AbsenceReason),
    Off,
}

/// Consistent assignment state of one (date, slot).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotState {
    pub(crate) admissions: Option<String>,
    pub(crate) ward: BTreeSet<String>,
    pub(crate) absences: BTreeMap<String, AbsenceEntry>,
}

impl SlotState {
    pub fn admissions(&self) -> Option<&str> {
        self.admissions.as_deref()
    }

    pub fn ward(&self) -> &BTreeSet<String> {
        &self.ward
    }

    pub fn absences(&self) -> &BTreeMap<String, AbsenceEntry> {
        &self.absences
    }

    pub fn is_empty(&self) -> bool {
        self.admissions.is_none() && self.ward.is_empty() && self.absences.is_empty()
    }

    pub fn duty_of(&self, doctor_id: &str) -> DoctorDuty {
        if self.admissions.as_deref() == Some(doctor_id) {
            DoctorDuty::Admissions
        } else if let Some(entry) = self.absences.get(doctor_id) {
            DoctorDuty::Absent(entry.reason)
        } else if self.ward.contains(doctor_id) {
            DoctorDuty::Ward
        } else {
            DoctorDuty::Off
        }
    }

    /// Set or clear the admissions doctor.
    pub fn set_admissions(&mut self, doctor_id: Option<&str>) {
        if let Some(doctor_id) = doctor_id {
            self.ward.remove(doctor_id);
            self.absences.remove(doctor_id);
        }
        self.admissions = doctor_id.map(str::to_string);
    }

    /// Whether the ward control is enabled for the doctor.
    pub fn can_join_ward(&self, doctor_id: &str) -> bool {
        self.admissions.as_deref() != Some(doctor_id) && !self.absences.contains_key(doctor_id)
    }

    /// Toggle ward membership; disabled doctors are left untouched.
    pub fn toggle_ward(&mut self, doctor_id: &str) {
        if !self.ward.remove(doctor_id) && self.can_join_ward(doctor_id) {
            self.ward.insert(doctor_id.to_string());
        }
    }

    /// Add to ward if allowed.
    pub fn join_ward(&mut self, doctor_id: &str) {
        if self.can_join_ward(doctor_id) {
            self.ward.insert(doctor_id.to_string());
        }
    }

    /// Mark the doctor absent; absence wins over ward and admissions.
    pub fn set_absence(&mut self, doctor_id: &str, entry: AbsenceEntry) {
        self.ward.remove(doctor_id);
        if self.admissions.as_deref() == Some(doctor_id) {
            self.admissions = None;
        }
        self.absences.insert(doctor_id.to_string(), entry);
    }

    /// Remove the doctor's absence, leaving them off.
    pub fn clear_absence(&mut self, doctor_id: &str) {
        self.absences.remove(doctor_id);
    }

    /// Clear the absence if it already has `reason`, otherwise assign it.
    pub fn toggle_absence(&mut self, doctor_id: &str, reason: AbsenceReason) {
        match self.absences.get(doctor_id) {
            Some(entry) if entry.reason == reason => self.clear_absence(doctor_id),
            _ => self.set_absence(doctor_id, AbsenceEntry::new(reason)),
        }
    }

    /// Reset to the fully empty slot.
    pub fn clear(&mut self) {
        *self = SlotState::default();
    }

    /// Active doctors that hold no role and no absence here.
    pub fn off_doctors<'d, I>(&self, active_doctor_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'d str>,
    {
        active_doctor_ids
            .into_iter()
            .filter(|id| self.duty_of(id) == DoctorDuty::Off)
            .map(str::to_string)
            .collect()
    }

    /// Every doctor appears in at most one of admissions, ward and absences.
    pub fn is_consistent(&self) -> bool {
        let admissions_clash = self
            .admissions
            .as_deref()
            .map_or(false, |a| self.ward.contains(a) || self.absences.contains_key(a));
        let ward_clash = self.ward.iter().any(|d| self.absences.contains_key(d));
        !admissions_clash && !ward_clash
    }

    /// Restore consistency using the precedence rules (absence, then admissions).
    pub(crate) fn reconcile(&mut self) {
        let absent: Vec<String> = self.absences.keys().cloned().collect();
        for doctor_id in absent {
            self.ward.remove(&doctor_id);
            if self.admissions.as_deref() == Some(doctor_id.as_str()) {
                self.admissions = None;
            }
        }
        if let Some(admissions) = self.admissions.clone() {
            self.ward.remove(&admissions);
        }
    }
}
