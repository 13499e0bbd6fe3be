//! Ward Roster Core Library
//!
//! Consistency and approval engine for weekly hospital duty rosters: who
//! staffs admissions, who covers the ward and who is away, per half-day slot.
//!
//! # Architecture
//!
//! ```text
//!            Planner UI (per-slot / whole-day edits)
//!                            │
//!                     ┌──────▼──────┐
//!                     │   editor    │  reconciliation rules, detailed mode
//!                     └──────┬──────┘
//!                            │ WeekSchedule
//!                     ┌──────▼──────┐
//!                     │  workflow   │  permissions, validator, approval,
//!                     │   Roster    │  month aggregation, carry-forward
//!                     └──────┬──────┘
//!                            │ BEGIN IMMEDIATE
//!             ┌──────────────┼──────────────┐
//!             ▼              ▼              ▼
//!          doctors      weeks + rows    change_log
//!                                     (hash chained)
//! ```
//!
//! # Core Principle
//!
//! **An approved week is read-only.** It only becomes editable again through
//! an explicit revert, and every approval, revert and save is recorded in the
//! change log.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage
//! - [`models`]: Domain types (Doctor, Week, SlotAssignment, Absence, etc.)
//! - [`editor`]: In-memory week editor applying the reconciliation rules
//! - [`workflow`]: Roster service (validation, approval, month, carry-forward)
//! - [`audit`]: Tamper-evident change log
//! - [`config`]: TOML configuration

pub mod audit;
pub mod config;
pub mod db;
pub mod editor;
pub mod models;
pub mod workflow;

// Re-export commonly used types
pub use audit::{ChainStatus, ChangeLog};
pub use config::RosterConfig;
pub use db::Database;
pub use editor::{AbsenceEntry, DayPlan, ScheduleEditor, SlotState};
pub use models::{
    Absence, AbsenceReason, Doctor, Role, Slot, SlotAssignment, SlotKey, Week, WeekSchedule,
    WeekStatus,
};
pub use workflow::{
    Actor, CarryForwardSummary, CollisionPolicy, ErrorKind, MonthApproval, MonthIssue,
    MonthReport, Permission, Roster, RosterError, WeekValidation,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum WardRosterError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<RosterError> for WardRosterError {
    fn from(e: RosterError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::Authorization => WardRosterError::Unauthorized(message),
            ErrorKind::Precondition => WardRosterError::Precondition(message),
            ErrorKind::Validation => WardRosterError::InvalidInput(message),
            ErrorKind::NotFound => WardRosterError::NotFound(message),
            ErrorKind::Storage => WardRosterError::StorageError(message),
        }
    }
}

impl From<db::DbError> for WardRosterError {
    fn from(e: db::DbError) -> Self {
        RosterError::from(e).into()
    }
}

impl From<audit::AuditError> for WardRosterError {
    fn from(e: audit::AuditError) -> Self {
        WardRosterError::StorageError(e.to_string())
    }
}

impl From<config::ConfigError> for WardRosterError {
    fn from(e: config::ConfigError) -> Self {
        WardRosterError::InvalidInput(e.to_string())
    }
}

impl From<editor::EditError> for WardRosterError {
    fn from(e: editor::EditError) -> Self {
        let message = e.to_string();
        match e {
            editor::EditError::WeekLocked(_) | editor::EditError::ConfirmationRequired(_) => {
                WardRosterError::Precondition(message)
            }
            editor::EditError::DateOutsideWeek { .. } | editor::EditError::Invariant(_) => {
                WardRosterError::InvalidInput(message)
            }
        }
    }
}

impl From<models::DomainError> for WardRosterError {
    fn from(e: models::DomainError) -> Self {
        RosterError::from(e).into()
    }
}

impl<T> From<std::sync::PoisonError<T>> for WardRosterError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        WardRosterError::StorageError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `filter`. Returns false when a subscriber was
/// already installed.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        filter
            .unwrap_or_else(|| RosterConfig::default().logging.filter)
            .into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Open or create a roster database at the given path.
#[uniffi::export]
pub fn open_roster(path: String) -> Result<Arc<WardRosterCore>, WardRosterError> {
    let db = Database::open(&path)?;
    info!(path = %path, "Opened roster database");
    Ok(WardRosterCore::wrap(db, RosterConfig::default()))
}

/// Create an in-memory roster (for testing).
#[uniffi::export]
pub fn open_roster_in_memory() -> Result<Arc<WardRosterCore>, WardRosterError> {
    let db = Database::open_in_memory()?;
    Ok(WardRosterCore::wrap(db, RosterConfig::default()))
}

/// Open the roster described by a TOML config file.
///
/// Without a `[database] path` the roster lives in memory.
#[uniffi::export]
pub fn open_roster_with_config(
    config_path: String,
) -> Result<Arc<WardRosterCore>, WardRosterError> {
    let config = RosterConfig::load(&config_path)?;
    let db = match &config.database.path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    info!(
        config = %config_path,
        collision = ?config.carry_forward.collision,
        "Opened roster from config"
    );
    Ok(WardRosterCore::wrap(db, config))
}

/// Resolve the caller and check `permission` before any argument is parsed.
fn authorize(actor: FfiActor, permission: Permission) -> Result<Actor, WardRosterError> {
    let actor = Actor::from(actor);
    actor.require(permission)?;
    Ok(actor)
}

fn parse_date(s: &str) -> Result<NaiveDate, WardRosterError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| WardRosterError::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

fn parse_slot(s: &str) -> Result<Slot, WardRosterError> {
    Slot::parse(s.trim()).ok_or_else(|| WardRosterError::InvalidInput(format!("Invalid slot '{}'", s)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe roster wrapper for FFI.
#[derive(uniffi::Object)]
pub struct WardRosterCore {
    db: Arc<Mutex<Database>>,
    config: RosterConfig,
}

impl WardRosterCore {
    fn wrap(db: Database, config: RosterConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl WardRosterCore {
    // =========================================================================
    // Doctor Operations
    // =========================================================================

    pub fn create_doctor(&self, actor: FfiActor, name: String) -> Result<FfiDoctor, WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        let doctor = Roster::with_config(&db, &self.config).create_doctor(&actor, &name)?;
        Ok(doctor.into())
    }

    pub fn rename_doctor(
        &self,
        actor: FfiActor,
        doctor_id: String,
        name: String,
    ) -> Result<FfiDoctor, WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        let doctor = Roster::with_config(&db, &self.config).rename_doctor(&actor, &doctor_id, &name)?;
        Ok(doctor.into())
    }

    pub fn archive_doctor(&self, actor: FfiActor, doctor_id: String) -> Result<FfiDoctor, WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        let doctor = Roster::with_config(&db, &self.config).archive_doctor(&actor, &doctor_id)?;
        Ok(doctor.into())
    }

    pub fn restore_doctor(&self, actor: FfiActor, doctor_id: String) -> Result<FfiDoctor, WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        let doctor = Roster::with_config(&db, &self.config).restore_doctor(&actor, &doctor_id)?;
        Ok(doctor.into())
    }

    /// Link a doctor to a user profile; `None` unlinks.
    pub fn link_user_profile(
        &self,
        actor: FfiActor,
        doctor_id: String,
        user_profile_id: Option<String>,
    ) -> Result<FfiDoctor, WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        let doctor = Roster::with_config(&db, &self.config).link_user_profile(
            &actor,
            &doctor_id,
            user_profile_id.as_deref(),
        )?;
        Ok(doctor.into())
    }

    /// Hard-delete a doctor. Fails while any schedule row or profile link references them.
    pub fn delete_doctor(&self, actor: FfiActor, doctor_id: String) -> Result<(), WardRosterError> {
        let actor = authorize(actor, Permission::ManageDoctors)?;
        let db = self.db.lock()?;
        Roster::with_config(&db, &self.config).delete_doctor(&actor, &doctor_id)?;
        Ok(())
    }

    pub fn list_doctors(&self, include_archived: bool) -> Result<Vec<FfiDoctor>, WardRosterError> {
        let db = self.db.lock()?;
        let doctors = Roster::with_config(&db, &self.config).list_doctors(include_archived)?;
        Ok(doctors.into_iter().map(|d| d.into()).collect())
    }

    // =========================================================================
    // Week Operations
    // =========================================================================

    /// Create the week starting at `monday` (YYYY-MM-DD), or return the existing one.
    pub fn create_week(&self, actor: FfiActor, monday: String) -> Result<FfiWeek, WardRosterError> {
        let actor = authorize(actor, Permission::EditSchedule)?;
        let monday = parse_date(&monday)?;
        let db = self.db.lock()?;
        let week = Roster::with_config(&db, &self.config).create_week(&actor, monday)?;
        Ok(week.into())
    }

    pub fn delete_week(&self, actor: FfiActor, week_id: String) -> Result<(), WardRosterError> {
        let actor = authorize(actor, Permission::EditSchedule)?;
        let db = self.db.lock()?;
        Roster::with_config(&db, &self.config).delete_week(&actor, &week_id)?;
        Ok(())
    }

    pub fn get_week(&self, week_id: String) -> Result<FfiWeek, WardRosterError> {
        let db = self.db.lock()?;
        let week = Roster::with_config(&db, &self.config).get_week(&week_id)?;
        Ok(week.into())
    }

    pub fn find_week(&self, week_start: String) -> Result<Option<FfiWeek>, WardRosterError> {
        let week_start = parse_date(&week_start)?;
        let db = self.db.lock()?;
        let week = Roster::with_config(&db, &self.config).find_week(week_start)?;
        Ok(week.map(|w| w.into()))
    }

    /// Weeks starting within `from..=to`.
    pub fn list_weeks(&self, from: String, to: String) -> Result<Vec<FfiWeek>, WardRosterError> {
        let (from, to) = (parse_date(&from)?, parse_date(&to)?);
        let db = self.db.lock()?;
        let weeks = Roster::with_config(&db, &self.config).list_weeks(from, to)?;
        Ok(weeks.into_iter().map(|w| w.into()).collect())
    }

    // =========================================================================
    // Schedule Operations
    // =========================================================================

    /// Replace a draft week's assignments and absences.
    pub fn save_week_schedule(
        &self,
        actor: FfiActor,
        week_id: String,
        assignments: Vec<FfiAssignment>,
        absences: Vec<FfiAbsence>,
    ) -> Result<(), WardRosterError> {
        let actor = authorize(actor, Permission::EditSchedule)?;
        let assignments = assignments
            .into_iter()
            .map(SlotAssignment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let absences = absences
            .into_iter()
            .map(Absence::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let db = self.db.lock()?;
        Roster::with_config(&db, &self.config).save_week_schedule(&actor, &week_id, assignments, absences)?;
        Ok(())
    }

    /// Stored schedule of a week with conflicting rows reconciled.
    pub fn load_week_schedule(&self, week_id: String) -> Result<FfiWeekSchedule, WardRosterError> {
        let db = self.db.lock()?;
        let schedule = Roster::with_config(&db, &self.config).load_schedule(&week_id)?;
        Ok(schedule.into())
    }

    /// Interactive editor over a stored week. Approved weeks open locked.
    pub fn open_editor(&self, week_id: String) -> Result<Arc<WardRosterEditor>, WardRosterError> {
        let db = self.db.lock()?;
        let editor = Roster::with_config(&db, &self.config).open_editor(&week_id)?;
        Ok(Arc::new(WardRosterEditor {
            db: Arc::clone(&self.db),
            config: self.config.clone(),
            editor: Mutex::new(editor),
        }))
    }

    // =========================================================================
    // Approval Workflow
    // =========================================================================

    pub fn validate_week(&self, week_id: String) -> Result<FfiWeekValidation, WardRosterError> {
        let db = self.db.lock()?;
        let validation = Roster::with_config(&db, &self.config).validate_week(&week_id)?;
        Ok(validation.into())
    }

    /// Approve a draft week. Refused while `has_unsaved_changes` is set.
    pub fn approve_week(
        &self,
        actor: FfiActor,
        week_id: String,
        has_unsaved_changes: bool,
    ) -> Result<FfiWeek, WardRosterError> {
        let actor = authorize(actor, Permission::ApproveSchedule)?;
        let db = self.db.lock()?;
        let week = Roster::with_config(&db, &self.config).approve_week(&actor, &week_id, has_unsaved_changes)?;
        Ok(week.into())
    }

    pub fn revert_week(&self, actor: FfiActor, week_id: String) -> Result<FfiWeek, WardRosterError> {
        let actor = authorize(actor, Permission::ApproveSchedule)?;
        let db = self.db.lock()?;
        let week = Roster::with_config(&db, &self.config).revert_week(&actor, &week_id)?;
        Ok(week.into())
    }

    pub fn check_month(&self, month_start: String) -> Result<FfiMonthReport, WardRosterError> {
        let month_start = parse_date(&month_start)?;
        let db = self.db.lock()?;
        let report = Roster::with_config(&db, &self.config).check_month(month_start)?;
        Ok(report.into())
    }

    /// Approve every draft week of a month, or none of them.
    pub fn approve_month(
        &self,
        actor: FfiActor,
        month_start: String,
    ) -> Result<FfiMonthApproval, WardRosterError> {
        let actor = authorize(actor, Permission::ApproveSchedule)?;
        let month_start = parse_date(&month_start)?;
        let db = self.db.lock()?;
        let outcome = Roster::with_config(&db, &self.config).approve_month(&actor, month_start)?;
        Ok(outcome.into())
    }

    /// Seed a draft week's ward and absence rows from the previous week.
    pub fn copy_week_forward(
        &self,
        actor: FfiActor,
        target_week_id: String,
    ) -> Result<FfiCarryForwardSummary, WardRosterError> {
        let actor = authorize(actor, Permission::EditSchedule)?;
        let db = self.db.lock()?;
        let summary = Roster::with_config(&db, &self.config).copy_week_forward(&actor, &target_week_id)?;
        Ok(summary.into())
    }

    // =========================================================================
    // Change Log
    // =========================================================================

    /// Re-hash the change log.
    pub fn verify_change_log(&self) -> Result<FfiChainStatus, WardRosterError> {
        let db = self.db.lock()?;
        let status = ChangeLog::new(&db).verify_chain()?;
        Ok(status.into())
    }
}

// =========================================================================
// Week Editor Object
// =========================================================================

/// Working copy of one week for an interactive planner.
///
/// Edits stay in memory until [`WardRosterEditor::save`]. The editor lock is
/// always taken before the database lock.
#[derive(uniffi::Object)]
pub struct WardRosterEditor {
    db: Arc<Mutex<Database>>,
    config: RosterConfig,
    editor: Mutex<ScheduleEditor>,
}

impl WardRosterEditor {
    fn edit<F>(&self, date: &str, f: F) -> Result<bool, WardRosterError>
    where
        F: FnOnce(&mut ScheduleEditor, NaiveDate) -> editor::EditResult<bool>,
    {
        let date = parse_date(date)?;
        let mut editor = self.editor.lock()?;
        Ok(f(&mut *editor, date)?)
    }

    fn edit_slot<F>(&self, date: &str, slot: &str, f: F) -> Result<bool, WardRosterError>
    where
        F: FnOnce(&mut ScheduleEditor, NaiveDate, Slot) -> editor::EditResult<bool>,
    {
        let slot = parse_slot(slot)?;
        self.edit(date, |editor, date| f(editor, date, slot))
    }
}

#[uniffi::export]
impl WardRosterEditor {
    pub fn week_id(&self) -> Result<String, WardRosterError> {
        Ok(self.editor.lock()?.week_id().to_string())
    }

    pub fn is_locked(&self) -> Result<bool, WardRosterError> {
        Ok(self.editor.lock()?.is_locked())
    }

    pub fn is_dirty(&self) -> Result<bool, WardRosterError> {
        Ok(self.editor.lock()?.is_dirty())
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn slot(&self, date: String, slot: String) -> Result<FfiSlotState, WardRosterError> {
        let (date, slot) = (parse_date(&date)?, parse_slot(&slot)?);
        let editor = self.editor.lock()?;
        editor
            .slot(date, slot)
            .map(FfiSlotState::from)
            .ok_or_else(|| WardRosterError::InvalidInput(format!("{} is not a day of this week", date)))
    }

    pub fn is_detailed(&self, date: String) -> Result<bool, WardRosterError> {
        let date = parse_date(&date)?;
        Ok(self.editor.lock()?.is_detailed(date))
    }

    /// Whether the day's AM and PM cannot be shown as one value.
    pub fn has_slot_differences(&self, date: String) -> Result<bool, WardRosterError> {
        let date = parse_date(&date)?;
        Ok(self.editor.lock()?.has_slot_differences(date))
    }

    /// Active doctors with no duty in the slot.
    pub fn off_doctors(&self, date: String, slot: String) -> Result<Vec<String>, WardRosterError> {
        let (date, slot) = (parse_date(&date)?, parse_slot(&slot)?);
        let editor = self.editor.lock()?;
        let db = self.db.lock()?;
        let doctors = db.list_doctors(false)?;
        Ok(editor.off_doctors(date, slot, &doctors))
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Put a doctor on admissions; `None` clears the seat.
    pub fn set_admissions(
        &self,
        date: String,
        slot: String,
        doctor_id: Option<String>,
    ) -> Result<bool, WardRosterError> {
        self.edit_slot(&date, &slot, |editor, date, slot| {
            editor.set_admissions(date, slot, doctor_id.as_deref())
        })
    }

    pub fn toggle_ward(&self, date: String, slot: String, doctor_id: String) -> Result<bool, WardRosterError> {
        self.edit_slot(&date, &slot, |editor, date, slot| {
            editor.toggle_ward(date, slot, &doctor_id)
        })
    }

    pub fn set_absence(
        &self,
        date: String,
        slot: String,
        doctor_id: String,
        reason: String,
        note: Option<String>,
    ) -> Result<bool, WardRosterError> {
        let entry = AbsenceEntry::with_note(AbsenceReason::parse_lenient(&reason), note);
        self.edit_slot(&date, &slot, |editor, date, slot| {
            editor.set_absence(date, slot, &doctor_id, entry)
        })
    }

    pub fn toggle_absence(
        &self,
        date: String,
        slot: String,
        doctor_id: String,
        reason: String,
    ) -> Result<bool, WardRosterError> {
        let reason = AbsenceReason::parse_lenient(&reason);
        self.edit_slot(&date, &slot, |editor, date, slot| {
            editor.toggle_absence(date, slot, &doctor_id, reason)
        })
    }

    pub fn clear_absence(&self, date: String, slot: String, doctor_id: String) -> Result<bool, WardRosterError> {
        self.edit_slot(&date, &slot, |editor, date, slot| {
            editor.clear_absence(date, slot, &doctor_id)
        })
    }

    pub fn toggle_day_ward(&self, date: String, doctor_id: String) -> Result<bool, WardRosterError> {
        self.edit(&date, |editor, date| editor.toggle_day_ward(date, &doctor_id))
    }

    pub fn toggle_day_absence(
        &self,
        date: String,
        doctor_id: String,
        reason: String,
    ) -> Result<bool, WardRosterError> {
        let reason = AbsenceReason::parse_lenient(&reason);
        self.edit(&date, |editor, date| editor.toggle_day_absence(date, &doctor_id, reason))
    }

    pub fn set_day_absence(
        &self,
        date: String,
        doctor_id: String,
        reason: String,
        note: Option<String>,
    ) -> Result<bool, WardRosterError> {
        let entry = AbsenceEntry::with_note(AbsenceReason::parse_lenient(&reason), note);
        self.edit(&date, |editor, date| editor.set_day_absence(date, &doctor_id, entry))
    }

    pub fn clear_slot(&self, date: String, slot: String) -> Result<bool, WardRosterError> {
        self.edit_slot(&date, &slot, |editor, date, slot| editor.clear_slot(date, slot))
    }

    pub fn clear_day(&self, date: String) -> Result<bool, WardRosterError> {
        self.edit(&date, |editor, date| editor.clear_day(date))
    }

    /// Switch a day between one value and per-slot values. Returns whether the
    /// day is detailed afterwards.
    pub fn toggle_detailed_mode(&self, date: String, confirm_discard: bool) -> Result<bool, WardRosterError> {
        self.edit(&date, |editor, date| editor.toggle_detailed_mode(date, confirm_discard))
    }

    // =========================================================================
    // Workflow
    // =========================================================================

    pub fn save(&self, actor: FfiActor) -> Result<(), WardRosterError> {
        let actor = authorize(actor, Permission::EditSchedule)?;
        let mut editor = self.editor.lock()?;
        let db = self.db.lock()?;
        Roster::with_config(&db, &self.config).save_editor(&actor, &mut editor)?;
        Ok(())
    }

    /// Approve the week. Refused while the working copy has unsaved edits;
    /// the editor is locked afterwards.
    pub fn approve(&self, actor: FfiActor) -> Result<FfiWeek, WardRosterError> {
        let actor = authorize(actor, Permission::ApproveSchedule)?;
        let mut editor = self.editor.lock()?;
        let db = self.db.lock()?;
        let roster = Roster::with_config(&db, &self.config);
        let week = roster.approve_week(&actor, editor.week_id(), editor.is_dirty())?;
        *editor = roster.open_editor(&week.week_id)?;
        Ok(week.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe caller identity and permission codes.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActor {
    pub identity: String,
    /// "manage_doctors", "edit_schedule", "approve_schedule"
    pub permissions: Vec<String>,
}

/// Unknown permission codes grant nothing.
impl From<FfiActor> for Actor {
    fn from(actor: FfiActor) -> Self {
        let permissions = actor.permissions.iter().filter_map(|p| Permission::parse(p.trim()));
        Actor::new(actor.identity, permissions.collect::<Vec<_>>())
    }
}

/// FFI-safe doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub doctor_id: String,
    pub name: String,
    pub active: bool,
    pub user_profile_id: Option<String>,
}

impl From<Doctor> for FfiDoctor {
    fn from(doctor: Doctor) -> Self {
        Self {
            doctor_id: doctor.doctor_id,
            name: doctor.name,
            active: doctor.active,
            user_profile_id: doctor.user_profile_id,
        }
    }
}

/// FFI-safe week.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWeek {
    pub week_id: String,
    pub week_start: String,
    pub status: String,
    pub approved_at: Option<String>,
    pub approved_by: Option<String>,
    pub updated_at: String,
}

impl From<Week> for FfiWeek {
    fn from(week: Week) -> Self {
        Self {
            week_id: week.week_id,
            week_start: week.week_start.to_string(),
            status: week.status.as_str().to_string(),
            approved_at: week.approved_at,
            approved_by: week.approved_by,
            updated_at: week.updated_at,
        }
    }
}

/// FFI-safe slot assignment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAssignment {
    pub date: String,
    /// "AM" or "PM"
    pub slot: String,
    pub doctor_id: String,
    /// "ADMISSIONS" or "WARD"
    pub role: String,
}

impl TryFrom<FfiAssignment> for SlotAssignment {
    type Error = WardRosterError;

    fn try_from(a: FfiAssignment) -> Result<Self, Self::Error> {
        let role = Role::parse(&a.role.trim().to_ascii_uppercase())
            .ok_or_else(|| WardRosterError::InvalidInput(format!("Invalid role '{}'", a.role)))?;
        Ok(SlotAssignment::new(
            parse_date(&a.date)?,
            parse_slot(&a.slot)?,
            a.doctor_id,
            role,
        ))
    }
}

impl From<SlotAssignment> for FfiAssignment {
    fn from(a: SlotAssignment) -> Self {
        Self {
            date: a.date.to_string(),
            slot: a.slot.as_str().to_string(),
            doctor_id: a.doctor_id,
            role: a.role.as_str().to_string(),
        }
    }
}

/// FFI-safe absence. Unknown reason codes are stored as "OTHER".
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAbsence {
    pub date: String,
    pub slot: String,
    pub doctor_id: String,
    pub reason: String,
    pub note: Option<String>,
}

impl TryFrom<FfiAbsence> for Absence {
    type Error = WardRosterError;

    fn try_from(a: FfiAbsence) -> Result<Self, Self::Error> {
        Ok(Absence::new(
            parse_date(&a.date)?,
            parse_slot(&a.slot)?,
            a.doctor_id,
            AbsenceReason::parse_lenient(&a.reason),
            a.note,
        ))
    }
}

impl From<Absence> for FfiAbsence {
    fn from(a: Absence) -> Self {
        Self {
            date: a.date.to_string(),
            slot: a.slot.as_str().to_string(),
            doctor_id: a.doctor_id,
            reason: a.reason.as_str().to_string(),
            note: a.note,
        }
    }
}

/// FFI-safe week schedule.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWeekSchedule {
    pub week_start: String,
    pub assignments: Vec<FfiAssignment>,
    pub absences: Vec<FfiAbsence>,
}

impl From<WeekSchedule> for FfiWeekSchedule {
    fn from(schedule: WeekSchedule) -> Self {
        Self {
            week_start: schedule.week_start().to_string(),
            assignments: schedule.assignments().iter().cloned().map(|a| a.into()).collect(),
            absences: schedule.absences().iter().cloned().map(|a| a.into()).collect(),
        }
    }
}

/// FFI-safe absence inside one editor slot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSlotAbsence {
    pub doctor_id: String,
    pub reason: String,
    pub note: Option<String>,
}

/// FFI-safe view of one (date, slot) in the editor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSlotState {
    pub admissions: Option<String>,
    pub ward: Vec<String>,
    pub absences: Vec<FfiSlotAbsence>,
}

impl From<SlotState> for FfiSlotState {
    fn from(state: SlotState) -> Self {
        Self {
            admissions: state.admissions().map(str::to_string),
            ward: state.ward().iter().cloned().collect(),
            absences: state
                .absences()
                .iter()
                .map(|(doctor_id, entry)| FfiSlotAbsence {
                    doctor_id: doctor_id.clone(),
                    reason: entry.reason.as_str().to_string(),
                    note: entry.note.clone(),
                })
                .collect(),
        }
    }
}

/// FFI-safe (date, slot) pair.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSlotKey {
    pub date: String,
    pub slot: String,
}

impl From<SlotKey> for FfiSlotKey {
    fn from(key: SlotKey) -> Self {
        Self {
            date: key.date.to_string(),
            slot: key.slot.as_str().to_string(),
        }
    }
}

/// FFI-safe validator output.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWeekValidation {
    pub week_start: String,
    pub is_ok: bool,
    pub missing: Vec<FfiSlotKey>,
}

impl From<WeekValidation> for FfiWeekValidation {
    fn from(v: WeekValidation) -> Self {
        Self {
            week_start: v.week_start.to_string(),
            is_ok: v.is_ok(),
            missing: v.missing.into_iter().map(|k| k.into()).collect(),
        }
    }
}

/// FFI-safe month issue. `date` and `slot` are set for missing admissions only.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMonthIssue {
    /// "MISSING_WEEK" or "MISSING_ADMISSIONS"
    pub kind: String,
    pub week_start: String,
    pub date: Option<String>,
    pub slot: Option<String>,
}

impl From<MonthIssue> for FfiMonthIssue {
    fn from(issue: MonthIssue) -> Self {
        match issue {
            MonthIssue::MissingWeek { week_start } => Self {
                kind: "MISSING_WEEK".to_string(),
                week_start: week_start.to_string(),
                date: None,
                slot: None,
            },
            MonthIssue::MissingAdmissions {
                week_start,
                date,
                slot,
            } => Self {
                kind: "MISSING_ADMISSIONS".to_string(),
                week_start: week_start.to_string(),
                date: Some(date.to_string()),
                slot: Some(slot.as_str().to_string()),
            },
        }
    }
}

/// FFI-safe month report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMonthReport {
    pub month_start: String,
    pub week_starts: Vec<String>,
    pub issues: Vec<FfiMonthIssue>,
}

impl From<MonthReport> for FfiMonthReport {
    fn from(report: MonthReport) -> Self {
        Self {
            month_start: report.month_start.to_string(),
            week_starts: report.week_starts.iter().map(|d| d.to_string()).collect(),
            issues: report.issues.into_iter().map(|i| i.into()).collect(),
        }
    }
}

/// FFI-safe month approval outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMonthApproval {
    pub approved: bool,
    pub week_ids: Vec<String>,
    pub approved_at: Option<String>,
    pub issues: Vec<FfiMonthIssue>,
}

impl From<MonthApproval> for FfiMonthApproval {
    fn from(outcome: MonthApproval) -> Self {
        match outcome {
            MonthApproval::Approved {
                week_ids,
                approved_at,
            } => Self {
                approved: true,
                week_ids,
                approved_at: Some(approved_at),
                issues: Vec::new(),
            },
            MonthApproval::Rejected { issues } => Self {
                approved: false,
                week_ids: Vec::new(),
                approved_at: None,
                issues: issues.into_iter().map(|i| i.into()).collect(),
            },
        }
    }
}

/// FFI-safe carry-forward counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCarryForwardSummary {
    pub ward_inserted: u32,
    pub absences_inserted: u32,
    pub skipped_due_to_admissions: u32,
}

impl From<CarryForwardSummary> for FfiCarryForwardSummary {
    fn from(s: CarryForwardSummary) -> Self {
        Self {
            ward_inserted: s.ward_inserted,
            absences_inserted: s.absences_inserted,
            skipped_due_to_admissions: s.skipped_due_to_admissions,
        }
    }
}

/// FFI-safe change log verification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiChainStatus {
    pub intact: bool,
    pub entries: u32,
    pub broken_seq: Option<i64>,
}

impl From<ChainStatus> for FfiChainStatus {
    fn from(status: ChainStatus) -> Self {
        match status {
            ChainStatus::Intact { entries } => Self {
                intact: true,
                entries: entries as u32,
                broken_seq: None,
            },
            ChainStatus::Broken { seq } => Self {
                intact: false,
                entries: 0,
                broken_seq: Some(seq),
            },
        }
    }
}
