//! Doctor records.

use serde::{Deserialize, Serialize};

/// A doctor of the department. Archiving is a soft delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    /// Opaque UUID
    pub doctor_id: String,
    /// Display name
    pub name: String,
    /// False once archived
    pub active: bool,
    /// Identity of the linked user profile, if any
    pub user_profile_id: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Doctor {
    /// Create a new active doctor.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            doctor_id: uuid::Uuid::new_v4().to_string(),
            name,
            active: true,
            user_profile_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check if the doctor is linked to a user profile.
    pub fn has_user_profile(&self) -> bool {
        self.user_profile_id.is_some()
    }
}

/// Rows that keep a doctor from being hard-deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoctorReferences {
    pub slot_assignments: u32,
    pub absences: u32,
    pub user_profile: bool,
}

impl DoctorReferences {
    pub fn is_unreferenced(&self) -> bool {
        self.slot_assignments == 0 && self.absences == 0 && !self.user_profile
    }
}

impl std::fmt::Display for DoctorReferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} slot assignment(s), {} absence(s), user profile linked: {}",
            self.slot_assignments, self.absences, self.user_profile
        )
    }
}
