//! Month Aggregator: validation and all-or-nothing approval across a month.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::validator::validate_stored;
use super::{now, Actor, Permission, Roster, RosterError, RosterResult};
use crate::audit::{ChangeAction, ChangeLog};
use crate::db::Database;
use crate::models::{monday_of, Slot};

/// One reason a month cannot be approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonthIssue {
    MissingWeek {
        week_start: NaiveDate,
    },
    MissingAdmissions {
        week_start: NaiveDate,
        date: NaiveDate,
        slot: Slot,
    },
}

/// Aggregated validator output for a month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthReport {
    pub month_start: NaiveDate,
    pub week_starts: Vec<NaiveDate>,
    pub issues: Vec<MonthIssue>,
}

impl MonthReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of a month approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MonthApproval {
    /// Every draft week in range was approved with the same metadata
    Approved {
        week_ids: Vec<String>,
        approved_at: String,
    },
    /// Nothing changed
    Rejected { issues: Vec<MonthIssue> },
}

/// Mondays of the weeks whose Monday..Friday span intersects the month.
pub fn month_week_starts(month_start: NaiveDate) -> RosterResult<Vec<NaiveDate>> {
    if month_start.day() != 1 {
        return Err(RosterError::NotFirstOfMonth(month_start));
    }
    let next_month = month_start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| RosterError::MalformedPayload(format!("month after {} is out of range", month_start)))?;
    let month_end = next_month - Duration::days(1);

    let mut first = monday_of(month_start);
    if matches!(month_start.weekday(), Weekday::Sat | Weekday::Sun) {
        first += Duration::days(7);
    }
    let last = monday_of(month_end);

    let mut starts = Vec::new();
    let mut current = first;
    while current <= last {
        starts.push(current);
        current += Duration::days(7);
    }
    Ok(starts)
}

fn collect_issues(db: &Database, week_starts: &[NaiveDate]) -> RosterResult<Vec<MonthIssue>> {
    let mut issues = Vec::new();
    for &week_start in week_starts {
        match db.get_week_by_start(week_start)? {
            None => issues.push(MonthIssue::MissingWeek { week_start }),
            Some(week) if week.is_draft() => {
                let validation = validate_stored(db, &week)?;
                issues.extend(validation.missing.into_iter().map(|key| {
                    MonthIssue::MissingAdmissions {
                        week_start,
                        date: key.date,
                        slot: key.slot,
                    }
                }));
            }
            Some(_) => {}
        }
    }
    Ok(issues)
}

impl<'a> Roster<'a> {
    /// Report every missing week and unstaffed admissions slot of the month.
    pub fn check_month(&self, month_start: NaiveDate) -> RosterResult<MonthReport> {
        let week_starts = month_week_starts(month_start)?;
        let issues = collect_issues(self.db, &week_starts)?;
        Ok(MonthReport {
            month_start,
            week_starts,
            issues,
        })
    }

    /// Approve every draft week of the month, or none of them.
    ///
    /// The report is recomputed under the write lock, so a week modified since
    /// an earlier `check_month` call is caught here.
    pub fn approve_month(&self, actor: &Actor, month_start: NaiveDate) -> RosterResult<MonthApproval> {
        actor.require(Permission::ApproveSchedule)?;
        let week_starts = month_week_starts(month_start)?;

        self.db.write_transaction(|db| {
            let issues = collect_issues(db, &week_starts)?;
            if !issues.is_empty() {
                warn!(month = %month_start, issues = issues.len(), "Month approval refused");
                return Ok(MonthApproval::Rejected { issues });
            }

            let approved_at = now();
            let mut week_ids = Vec::new();
            for &week_start in &week_starts {
                let week = match db.get_week_by_start(week_start)? {
                    Some(week) if week.is_draft() => week,
                    _ => continue,
                };
                db.mark_week_approved(&week.week_id, &approved_at, &actor.identity)?;
                ChangeLog::new(db).append(
                    Some(&week.week_id),
                    ChangeAction::ApproveMonth,
                    &actor.identity,
                    &json!({
                        "month_start": month_start,
                        "week_start": week_start,
                        "approved_at": approved_at,
                    }),
                )?;
                week_ids.push(week.week_id);
            }

            info!(month = %month_start, weeks = week_ids.len(), actor = %actor.identity, "Month approved");
            Ok(MonthApproval::Approved {
                week_ids,
                approved_at,
            })
        })
    }
}
