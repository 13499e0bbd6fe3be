//! Domain models for the ward roster.

mod doctor;
mod schedule;
mod week;

pub use doctor::*;
pub use schedule::*;
pub use week::*;

use chrono::NaiveDate;
use thiserror::Error;

/// Violations of the domain invariants, raised while constructing values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{0} is not a Monday")]
    NotAMonday(NaiveDate),

    #[error("{date} is not a business day of the week starting {week_start}")]
    DateOutsideWeek {
        week_start: NaiveDate,
        date: NaiveDate,
    },

    #[error("Invariant violated for week {week_start}, {date} {slot}, doctor {doctor_id}: {detail}")]
    InvariantViolation {
        week_start: NaiveDate,
        date: NaiveDate,
        slot: Slot,
        doctor_id: String,
        detail: String,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;
