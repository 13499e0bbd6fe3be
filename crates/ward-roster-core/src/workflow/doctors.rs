//! Doctor management.

use serde_json::json;
use tracing::info;

use super::{Actor, Permission, Roster, RosterError, RosterResult};
use crate::audit::{ChangeAction, ChangeLog};
use crate::db::Database;
use crate::models::Doctor;

fn clean_name(name: &str) -> RosterResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(RosterError::MalformedPayload("doctor name is empty".to_string()))
    } else {
        Ok(trimmed)
    }
}

fn load_doctor(db: &Database, doctor_id: &str) -> RosterResult<Doctor> {
    db.get_doctor(doctor_id)?
        .ok_or_else(|| RosterError::DoctorNotFound(doctor_id.to_string()))
}

impl<'a> Roster<'a> {
    /// Add an active doctor.
    pub fn create_doctor(&self, actor: &Actor, name: &str) -> RosterResult<Doctor> {
        actor.require(Permission::ManageDoctors)?;
        let doctor = Doctor::new(clean_name(name)?.to_string());
        self.db.insert_doctor(&doctor)?;
        info!(doctor_id = %doctor.doctor_id, actor = %actor.identity, "Doctor created");
        Ok(doctor)
    }

    pub fn get_doctor(&self, doctor_id: &str) -> RosterResult<Doctor> {
        load_doctor(self.db, doctor_id)
    }

    pub fn list_doctors(&self, include_archived: bool) -> RosterResult<Vec<Doctor>> {
        Ok(self.db.list_doctors(include_archived)?)
    }

    pub fn rename_doctor(&self, actor: &Actor, doctor_id: &str, name: &str) -> RosterResult<Doctor> {
        actor.require(Permission::ManageDoctors)?;
        let name = clean_name(name)?;
        if !self.db.rename_doctor(doctor_id, name)? {
            return Err(RosterError::DoctorNotFound(doctor_id.to_string()));
        }
        load_doctor(self.db, doctor_id)
    }

    /// Soft-delete: the doctor keeps their history but drops out of the active roster.
    pub fn archive_doctor(&self, actor: &Actor, doctor_id: &str) -> RosterResult<Doctor> {
        self.set_active(actor, doctor_id, false)
    }

    pub fn restore_doctor(&self, actor: &Actor, doctor_id: &str) -> RosterResult<Doctor> {
        self.set_active(actor, doctor_id, true)
    }

    fn set_active(&self, actor: &Actor, doctor_id: &str, active: bool) -> RosterResult<Doctor> {
        actor.require(Permission::ManageDoctors)?;
        if !self.db.set_doctor_active(doctor_id, active)? {
            return Err(RosterError::DoctorNotFound(doctor_id.to_string()));
        }
        info!(doctor_id, active, actor = %actor.identity, "Doctor active flag changed");
        load_doctor(self.db, doctor_id)
    }

    /// Link the doctor to a user profile, or unlink with `None`.
    pub fn link_user_profile(
        &self,
        actor: &Actor,
        doctor_id: &str,
        user_profile_id: Option<&str>,
    ) -> RosterResult<Doctor> {
        actor.require(Permission::ManageDoctors)?;
        if !self.db.set_doctor_user_profile(doctor_id, user_profile_id)? {
            return Err(RosterError::DoctorNotFound(doctor_id.to_string()));
        }
        load_doctor(self.db, doctor_id)
    }

    /// Hard-delete a doctor that nothing references.
    pub fn delete_doctor(&self, actor: &Actor, doctor_id: &str) -> RosterResult<()> {
        actor.require(Permission::ManageDoctors)?;

        self.db.write_transaction(|db| {
            let doctor = load_doctor(db, doctor_id)?;
            let references = db.doctor_references(doctor_id)?;
            if !references.is_unreferenced() {
                return Err(RosterError::ReferentialConflict {
                    doctor_id: doctor_id.to_string(),
                    references,
                });
            }

            db.delete_doctor(doctor_id)?;
            ChangeLog::new(db).append(
                None,
                ChangeAction::DeleteDoctor,
                &actor.identity,
                &json!({ "doctor_id": doctor.doctor_id, "name": doctor.name }),
            )?;
            info!(doctor_id, actor = %actor.identity, "Doctor deleted");
            Ok(())
        })
    }
}
