//! Slot assignments, absences and the validated schedule of one week.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{is_business_day_of, DomainError, DomainResult};

/// Half-day time window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Am, Slot::Pm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Am => "AM",
            Slot::Pm => "PM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AM" => Some(Slot::Am),
            "PM" => Some(Slot::Pm),
            _ => None,
        }
    }

    /// The other slot of the same day.
    pub fn opposite(&self) -> Slot {
        match self {
            Slot::Am => Slot::Pm,
            Slot::Pm => Slot::Am,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Slot::Am => 0,
            Slot::Pm => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (date, slot) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub slot: Slot,
}

impl SlotKey {
    pub fn new(date: NaiveDate, slot: Slot) -> Self {
        Self { date, slot }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.slot)
    }
}

/// Stored coverage role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Single doctor staffing the admissions desk
    Admissions,
    /// Ward coverage, any number of doctors
    Ward,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admissions => "ADMISSIONS",
            Role::Ward => "WARD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMISSIONS" => Some(Role::Admissions),
            "WARD" => Some(Role::Ward),
            _ => None,
        }
    }
}

/// Reason a doctor is absent for a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbsenceReason {
    Vacation,
    Training,
    PostCall,
    Internship,
    Other,
}

impl AbsenceReason {
    pub const ALL: [AbsenceReason; 5] = [
        AbsenceReason::Vacation,
        AbsenceReason::Training,
        AbsenceReason::PostCall,
        AbsenceReason::Internship,
        AbsenceReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbsenceReason::Vacation => "VACATION",
            AbsenceReason::Training => "TRAINING",
            AbsenceReason::PostCall => "POST_CALL",
            AbsenceReason::Internship => "INTERNSHIP",
            AbsenceReason::Other => "OTHER",
        }
    }

    /// Parse a stored reason code. Unknown codes read as `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "VACATION" => AbsenceReason::Vacation,
            "TRAINING" => AbsenceReason::Training,
            "POST_CALL" => AbsenceReason::PostCall,
            "INTERNSHIP" => AbsenceReason::Internship,
            _ => AbsenceReason::Other,
        }
    }
}

/// One doctor holding one role in one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotAssignment {
    pub date: NaiveDate,
    pub slot: Slot,
    pub doctor_id: String,
    pub role: Role,
}

impl SlotAssignment {
    pub fn new(date: NaiveDate, slot: Slot, doctor_id: impl Into<String>, role: Role) -> Self {
        Self {
            date,
            slot,
            doctor_id: doctor_id.into(),
            role,
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.slot)
    }
}

/// One doctor absent for one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Absence {
    pub date: NaiveDate,
    pub slot: Slot,
    pub doctor_id: String,
    pub reason: AbsenceReason,
    pub note: Option<String>,
}

impl Absence {
    pub fn new(
        date: NaiveDate,
        slot: Slot,
        doctor_id: impl Into<String>,
        reason: AbsenceReason,
        note: Option<String>,
    ) -> Self {
        Self {
            date,
            slot,
            doctor_id: doctor_id.into(),
            reason,
            note,
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.slot)
    }
}

/// The complete, invariant-checked assignment set of one week.
///
/// This is the unit that is saved: rows are replaced wholesale on every save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekSchedule {
    week_start: NaiveDate,
    assignments: Vec<SlotAssignment>,
    absences: Vec<Absence>,
}

impl WeekSchedule {
    /// An empty schedule (every active doctor off everywhere).
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            assignments: Vec::new(),
            absences: Vec::new(),
        }
    }

    /// Build a schedule, rejecting the first invariant violation found.
    ///
    /// Checks, per (date, slot): dates are business days of the week, at most one
    /// admissions doctor, one role per doctor, one absence per doctor, and no doctor
    /// both assigned and absent.
    pub fn new(
        week_start: NaiveDate,
        mut assignments: Vec<SlotAssignment>,
        mut absences: Vec<Absence>,
    ) -> DomainResult<Self> {
        assignments.sort();
        absences.sort();

        let mut admissions: HashSet<SlotKey> = HashSet::new();
        let mut assigned: HashSet<(SlotKey, &str)> = HashSet::new();

        for assignment in &assignments {
            check_date(week_start, assignment.date)?;
            let key = assignment.key();
            let violation = |detail: &str| DomainError::InvariantViolation {
                week_start,
                date: assignment.date,
                slot: assignment.slot,
                doctor_id: assignment.doctor_id.clone(),
                detail: detail.to_string(),
            };

            if !assigned.insert((key, assignment.doctor_id.as_str())) {
                return Err(violation("doctor holds more than one role in the slot"));
            }
            if assignment.role == Role::Admissions && !admissions.insert(key) {
                return Err(violation("slot already has an admissions doctor"));
            }
        }

        let mut absent: HashSet<(SlotKey, &str)> = HashSet::new();
        for absence in &absences {
            check_date(week_start, absence.date)?;
            let key = absence.key();
            let violation = |detail: &str| DomainError::InvariantViolation {
                week_start,
                date: absence.date,
                slot: absence.slot,
                doctor_id: absence.doctor_id.clone(),
                detail: detail.to_string(),
            };

            if !absent.insert((key, absence.doctor_id.as_str())) {
                return Err(violation("doctor has more than one absence in the slot"));
            }
            if assigned.contains(&(key, absence.doctor_id.as_str())) {
                return Err(violation("doctor is both assigned and absent in the slot"));
            }
        }

        Ok(Self {
            week_start,
            assignments,
            absences,
        })
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    pub fn absences(&self) -> &[Absence] {
        &self.absences
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.absences.is_empty()
    }

    /// Admissions doctor of a slot, if staffed.
    pub fn admissions_for(&self, key: SlotKey) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.key() == key && a.role == Role::Admissions)
            .map(|a| a.doctor_id.as_str())
    }

    /// Check that no doctor appears twice in the slot and admissions is single-staffed.
    pub fn is_slot_consistent(&self, key: SlotKey) -> bool {
        let mut seen = HashSet::new();
        let mut admissions = 0;
        for assignment in self.assignments.iter().filter(|a| a.key() == key) {
            if assignment.role == Role::Admissions {
                admissions += 1;
            }
            if !seen.insert(assignment.doctor_id.as_str()) {
                return false;
            }
        }
        for absence in self.absences.iter().filter(|a| a.key() == key) {
            if !seen.insert(absence.doctor_id.as_str()) {
                return false;
            }
        }
        admissions <= 1
    }

    /// Check that the doctor holds no role and no absence in the slot.
    pub fn is_doctor_free(&self, key: SlotKey, doctor_id: &str) -> bool {
        !self
            .assignments
            .iter()
            .any(|a| a.key() == key && a.doctor_id == doctor_id)
            && !self
                .absences
                .iter()
                .any(|a| a.key() == key && a.doctor_id == doctor_id)
    }

    /// Number of admissions rows per slot.
    pub fn admissions_counts(&self) -> BTreeMap<SlotKey, u32> {
        let mut counts = BTreeMap::new();
        for assignment in self.assignments.iter().filter(|a| a.role == Role::Admissions) {
            *counts.entry(assignment.key()).or_insert(0) += 1;
        }
        counts
    }
}

fn check_date(week_start: NaiveDate, date: NaiveDate) -> DomainResult<()> {
    if is_business_day_of(week_start, date) {
        Ok(())
    } else {
        Err(DomainError::DateOutsideWeek { week_start, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 3).unwrap()
    }

    #[test]
    fn test_second_admissions_rejected() {
        let result = WeekSchedule::new(
            monday(),
            vec![
                SlotAssignment::new(monday(), Slot::Am, "a", Role::Admissions),
                SlotAssignment::new(monday(), Slot::Am, "b", Role::Admissions),
            ],
            vec![],
        );
        match result {
            Err(DomainError::InvariantViolation { slot, date, .. }) => {
                assert_eq!(slot, Slot::Am);
                assert_eq!(date, monday());
            }
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_two_roles_in_slot_rejected() {
        let result = WeekSchedule::new(
            monday(),
            vec![
                SlotAssignment::new(monday(), Slot::Pm, "a", Role::Admissions),
                SlotAssignment::new(monday(), Slot::Pm, "a", Role::Ward),
            ],
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_assigned_and_absent_rejected() {
        let result = WeekSchedule::new(
            monday(),
            vec![SlotAssignment::new(tuesday(), Slot::Am, "a", Role::Ward)],
            vec![Absence::new(tuesday(), Slot::Am, "a", AbsenceReason::Vacation, None)],
        );
        match result {
            Err(DomainError::InvariantViolation { doctor_id, .. }) => assert_eq!(doctor_id, "a"),
            other => panic!("expected invariant violation, got {:?}", other),
        }

        // Same doctor, different slot is fine
        let ok = WeekSchedule::new(
            monday(),
            vec![SlotAssignment::new(tuesday(), Slot::Am, "a", Role::Ward)],
            vec![Absence::new(tuesday(), Slot::Pm, "a", AbsenceReason::PostCall, None)],
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_date_outside_week_rejected() {
        let saturday = NaiveDate::from_ymd_opt(2024, 9, 7).unwrap();
        let result = WeekSchedule::new(
            monday(),
            vec![SlotAssignment::new(saturday, Slot::Am, "a", Role::Ward)],
            vec![],
        );
        assert_eq!(
            result.unwrap_err(),
            DomainError::DateOutsideWeek {
                week_start: monday(),
                date: saturday
            }
        );
    }

    #[test]
    fn test_predicates() {
        let schedule = WeekSchedule::new(
            monday(),
            vec![
                SlotAssignment::new(monday(), Slot::Am, "a", Role::Admissions),
                SlotAssignment::new(monday(), Slot::Am, "b", Role::Ward),
            ],
            vec![Absence::new(monday(), Slot::Am, "c", AbsenceReason::Training, None)],
        )
        .unwrap();

        let key = SlotKey::new(monday(), Slot::Am);
        assert!(schedule.is_slot_consistent(key));
        assert!(!schedule.is_doctor_free(key, "a"));
        assert!(!schedule.is_doctor_free(key, "c"));
        assert!(schedule.is_doctor_free(key, "d"));
        assert_eq!(schedule.admissions_for(key), Some("a"));
        assert_eq!(schedule.admissions_counts().get(&key), Some(&1));
    }

    #[test]
    fn test_reason_parsing_is_lenient() {
        assert_eq!(AbsenceReason::parse_lenient("POST_CALL"), AbsenceReason::PostCall);
        assert_eq!(AbsenceReason::parse_lenient("vacation"), AbsenceReason::Vacation);
        assert_eq!(AbsenceReason::parse_lenient("SABBATICAL"), AbsenceReason::Other);
    }
}
