//! Week Validator: the approval precondition.
//!
//! Every one of the ten (date, slot) pairs of a week needs exactly one
//! admissions doctor. Ward and absence coverage is advisory and never checked.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{load_week, Roster, RosterResult};
use crate::db::Database;
use crate::models::{slot_keys, Role, SlotAssignment, SlotKey, Week};

/// Validator outcome for one week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekValidation {
    pub week_start: NaiveDate,
    /// Slots whose admissions count is not exactly one, in calendar order
    pub missing: Vec<SlotKey>,
}

impl WeekValidation {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Slots of the week whose admissions count differs from one.
pub fn missing_admissions(week_start: NaiveDate, counts: &BTreeMap<SlotKey, u32>) -> Vec<SlotKey> {
    slot_keys(week_start)
        .into_iter()
        .filter(|key| counts.get(key).copied().unwrap_or(0) != 1)
        .collect()
}

/// Validate an in-memory assignment set.
pub fn validate_assignments(week_start: NaiveDate, assignments: &[SlotAssignment]) -> WeekValidation {
    let mut counts = BTreeMap::new();
    for assignment in assignments.iter().filter(|a| a.role == Role::Admissions) {
        *counts.entry(assignment.key()).or_insert(0) += 1;
    }
    WeekValidation {
        week_start,
        missing: missing_admissions(week_start, &counts),
    }
}

/// Validate the stored state of a week.
pub(crate) fn validate_stored(db: &Database, week: &Week) -> RosterResult<WeekValidation> {
    let counts = db.admissions_counts(&week.week_id)?;
    Ok(WeekValidation {
        week_start: week.week_start,
        missing: missing_admissions(week.week_start, &counts),
    })
}

impl<'a> Roster<'a> {
    /// Run the validator against a week's stored rows. Read-only.
    pub fn validate_week(&self, week_id: &str) -> RosterResult<WeekValidation> {
        let week = load_week(self.db, week_id)?;
        validate_stored(self.db, &week)
    }
}
