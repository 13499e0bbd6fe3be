//! Roster workflow service.
//!
//! [`Roster`] is the request/response surface of the engine: it checks the
//! caller's permissions, runs each mutation inside one immediate-mode write
//! transaction and appends the matching change log entry before commit.

mod approval;
mod carry_forward;
mod doctors;
mod month;
mod validator;
mod weeks;

pub use carry_forward::{CarryForwardSummary, CollisionPolicy};
pub use month::{month_week_starts, MonthApproval, MonthIssue, MonthReport};
pub use validator::{missing_admissions, validate_assignments, WeekValidation};

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::AuditError;
use crate::config::RosterConfig;
use crate::db::{Database, DbError};
use crate::editor::EditError;
use crate::models::{DoctorReferences, DomainError, SlotKey, Week};

/// Capability granted to a caller by the surrounding application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageDoctors,
    EditSchedule,
    ApproveSchedule,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageDoctors => "manage_doctors",
            Permission::EditSchedule => "edit_schedule",
            Permission::ApproveSchedule => "approve_schedule",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manage_doctors" => Some(Permission::ManageDoctors),
            "edit_schedule" => Some(Permission::EditSchedule),
            "approve_schedule" => Some(Permission::ApproveSchedule),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub identity: String,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    pub fn new(identity: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            identity: identity.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> RosterResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(RosterError::Unauthorized {
                identity: self.identity.clone(),
                permission,
            })
        }
    }
}

/// Failure class of a [`RosterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Precondition,
    Validation,
    NotFound,
    Storage,
}

/// Workflow errors.
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("{identity} lacks the {permission} permission")]
    Unauthorized {
        identity: String,
        permission: Permission,
    },

    #[error("Week not found: {0}")]
    WeekNotFound(String),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("{0} is not a Monday")]
    NotAMonday(NaiveDate),

    #[error("{0} is not the first day of a month")]
    NotFirstOfMonth(NaiveDate),

    #[error("Week starting {0} is approved and cannot be changed")]
    WeekLocked(NaiveDate),

    #[error("Week {0} has unsaved changes")]
    UnsavedChanges(String),

    #[error("Week starting {week_start} is missing admissions for {}", join_keys(.missing))]
    ApprovalPrecondition {
        week_start: NaiveDate,
        missing: Vec<SlotKey>,
    },

    #[error("No week starting {source_start} to copy into the week starting {target_start}")]
    NoSourceWeek {
        target_start: NaiveDate,
        source_start: NaiveDate,
    },

    #[error("Week starting {0} has no ward or absence rows to copy")]
    EmptySource(NaiveDate),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Doctor {doctor_id} is still referenced ({references}); archive instead")]
    ReferentialConflict {
        doctor_id: String,
        references: DoctorReferences,
    },

    #[error(transparent)]
    Invariant(DomainError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Change log error: {0}")]
    Audit(#[from] AuditError),
}

pub type RosterResult<T> = Result<T, RosterError>;

impl RosterError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RosterError::Unauthorized { .. } => ErrorKind::Authorization,
            RosterError::WeekLocked(_)
            | RosterError::UnsavedChanges(_)
            | RosterError::ApprovalPrecondition { .. }
            | RosterError::NoSourceWeek { .. }
            | RosterError::EmptySource(_) => ErrorKind::Precondition,
            RosterError::NotAMonday(_)
            | RosterError::NotFirstOfMonth(_)
            | RosterError::MalformedPayload(_)
            | RosterError::ReferentialConflict { .. }
            | RosterError::Invariant(_)
            | RosterError::Database(DbError::Constraint(_)) => ErrorKind::Validation,
            RosterError::WeekNotFound(_)
            | RosterError::DoctorNotFound(_)
            | RosterError::Database(DbError::NotFound(_)) => ErrorKind::NotFound,
            RosterError::Database(_) | RosterError::Audit(_) => ErrorKind::Storage,
        }
    }
}

impl From<DomainError> for RosterError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotAMonday(date) => RosterError::NotAMonday(date),
            DomainError::DateOutsideWeek { .. } => RosterError::MalformedPayload(e.to_string()),
            DomainError::InvariantViolation { .. } => RosterError::Invariant(e),
        }
    }
}

impl From<EditError> for RosterError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::WeekLocked(week_start) => RosterError::WeekLocked(week_start),
            EditError::Invariant(inner) => inner.into(),
            EditError::DateOutsideWeek { .. } | EditError::ConfirmationRequired(_) => {
                RosterError::MalformedPayload(e.to_string())
            }
        }
    }
}

fn join_keys(keys: &[SlotKey]) -> String {
    keys.iter()
        .map(SlotKey::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Workflow service over a roster database.
pub struct Roster<'a> {
    db: &'a Database,
    collision: CollisionPolicy,
}

impl<'a> Roster<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            collision: CollisionPolicy::default(),
        }
    }

    /// Service using the carry-forward policy from `config`.
    pub fn with_config(db: &'a Database, config: &RosterConfig) -> Self {
        Self {
            db,
            collision: config.carry_forward.collision,
        }
    }

    pub fn with_collision_policy(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn collision_policy(&self) -> CollisionPolicy {
        self.collision
    }
}

fn load_week(db: &Database, week_id: &str) -> RosterResult<Week> {
    db.get_week(week_id)?
        .ok_or_else(|| RosterError::WeekNotFound(week_id.to_string()))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
