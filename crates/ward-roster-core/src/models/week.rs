//! Weeks and calendar helpers.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{DomainError, DomainResult, Slot, SlotKey};

/// Business days per week (Monday to Friday).
pub const BUSINESS_DAYS: usize = 5;

/// Week lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    /// Mutable, not yet validated
    Draft,
    /// Validated and frozen until reverted
    Approved,
}

impl WeekStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStatus::Draft => "draft",
            WeekStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(WeekStatus::Draft),
            "approved" => Some(WeekStatus::Approved),
            _ => None,
        }
    }

    /// Check whether the lifecycle allows moving to `target`.
    pub fn can_transition_to(&self, target: &WeekStatus) -> bool {
        matches!(
            (self, target),
            (WeekStatus::Draft, WeekStatus::Approved) | (WeekStatus::Approved, WeekStatus::Draft)
        )
    }
}

/// A planning week, identified by its Monday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Week {
    /// Unique week ID
    pub week_id: String,
    /// Monday of the week (unique)
    pub week_start: NaiveDate,
    /// Lifecycle status
    pub status: WeekStatus,
    /// Approval timestamp
    pub approved_at: Option<String>,
    /// Identity of the approver
    pub approved_by: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Week {
    /// Create a new draft week. `week_start` must be a Monday.
    pub fn new(week_start: NaiveDate) -> DomainResult<Self> {
        if week_start.weekday() != Weekday::Mon {
            return Err(DomainError::NotAMonday(week_start));
        }
        let now = chrono::Utc::now().to_rfc3339();
        Ok(Self {
            week_id: uuid::Uuid::new_v4().to_string(),
            week_start,
            status: WeekStatus::Draft,
            approved_at: None,
            approved_by: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn is_draft(&self) -> bool {
        self.status == WeekStatus::Draft
    }

    pub fn is_approved(&self) -> bool {
        self.status == WeekStatus::Approved
    }

    /// Monday to Friday of this week.
    pub fn business_days(&self) -> [NaiveDate; BUSINESS_DAYS] {
        business_days(self.week_start)
    }

    /// The ten (date, slot) pairs of this week.
    pub fn slot_keys(&self) -> Vec<SlotKey> {
        slot_keys(self.week_start)
    }

    /// Monday of the week before.
    pub fn previous_week_start(&self) -> NaiveDate {
        self.week_start - Duration::days(7)
    }
}

/// Monday to Friday of the week starting at `week_start`.
pub fn business_days(week_start: NaiveDate) -> [NaiveDate; BUSINESS_DAYS] {
    let mut days = [week_start; BUSINESS_DAYS];
    for (offset, day) in days.iter_mut().enumerate() {
        *day = week_start + Duration::days(offset as i64);
    }
    days
}

/// Every (date, slot) pair of the week, in calendar order.
pub fn slot_keys(week_start: NaiveDate) -> Vec<SlotKey> {
    business_days(week_start)
        .iter()
        .flat_map(|&date| Slot::ALL.into_iter().map(move |slot| SlotKey::new(date, slot)))
        .collect()
}

/// Check whether `date` falls on Monday..Friday of the week starting at `week_start`.
pub fn is_business_day_of(week_start: NaiveDate, date: NaiveDate) -> bool {
    let offset = (date - week_start).num_days();
    (0..BUSINESS_DAYS as i64).contains(&offset)
}

/// Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}
