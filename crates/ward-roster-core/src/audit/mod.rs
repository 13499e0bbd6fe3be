//! Append-only, hash-chained change log.
//!
//! Saves replace a week's rows wholesale, so per-row history is lost at the
//! storage layer. Every mutating workflow operation therefore appends one entry
//! here, inside the same transaction as the mutation:
//!
//! ```text
//! entry_hash = sha256(prev_hash | action | week_id | actor | payload_json)
//! ```
//!
//! The first entry chains from the empty string.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::{ChangeRow, Database};

/// Change log errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown change action: {0}")]
    UnknownAction(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Kind of mutation recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    CreateWeek,
    DeleteWeek,
    SaveSchedule,
    ApproveWeek,
    RevertWeek,
    ApproveMonth,
    CopyForward,
    DeleteDoctor,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::CreateWeek => "create_week",
            ChangeAction::DeleteWeek => "delete_week",
            ChangeAction::SaveSchedule => "save_schedule",
            ChangeAction::ApproveWeek => "approve_week",
            ChangeAction::RevertWeek => "revert_week",
            ChangeAction::ApproveMonth => "approve_month",
            ChangeAction::CopyForward => "copy_forward",
            ChangeAction::DeleteDoctor => "delete_doctor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_week" => Some(ChangeAction::CreateWeek),
            "delete_week" => Some(ChangeAction::DeleteWeek),
            "save_schedule" => Some(ChangeAction::SaveSchedule),
            "approve_week" => Some(ChangeAction::ApproveWeek),
            "revert_week" => Some(ChangeAction::RevertWeek),
            "approve_month" => Some(ChangeAction::ApproveMonth),
            "copy_forward" => Some(ChangeAction::CopyForward),
            "delete_doctor" => Some(ChangeAction::DeleteDoctor),
            _ => None,
        }
    }
}

/// A decoded change log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub seq: i64,
    pub week_id: Option<String>,
    pub action: ChangeAction,
    pub actor: String,
    pub payload: serde_json::Value,
    pub entry_hash: String,
    pub created_at: String,
}

impl TryFrom<ChangeRow> for ChangeEntry {
    type Error = AuditError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let action =
            ChangeAction::parse(&row.action).ok_or(AuditError::UnknownAction(row.action))?;
        Ok(ChangeEntry {
            seq: row.seq,
            week_id: row.week_id,
            action,
            actor: row.actor,
            payload: serde_json::from_str(&row.payload)?,
            entry_hash: row.entry_hash,
            created_at: row.created_at,
        })
    }
}

/// Result of re-hashing the whole chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// Every entry hashes correctly and links to its predecessor
    Intact { entries: usize },
    /// First entry whose hash or link does not match
    Broken { seq: i64 },
}

/// Change log manager.
pub struct ChangeLog<'a> {
    db: &'a Database,
}

impl<'a> ChangeLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an entry chained to the current head.
    pub fn append<P: Serialize>(
        &self,
        week_id: Option<&str>,
        action: ChangeAction,
        actor: &str,
        payload: &P,
    ) -> AuditResult<String> {
        let payload = serde_json::to_string(payload)?;
        let prev_hash = self
            .db
            .last_change()?
            .map(|row| row.entry_hash)
            .unwrap_or_default();
        let entry_hash = entry_hash(&prev_hash, action.as_str(), week_id, actor, &payload);

        self.db.insert_change(
            week_id,
            action.as_str(),
            actor,
            &payload,
            &prev_hash,
            &entry_hash,
        )?;
        Ok(entry_hash)
    }

    /// Entries recorded for a week, oldest first.
    pub fn entries_for_week(&self, week_id: &str) -> AuditResult<Vec<ChangeEntry>> {
        self.db
            .list_changes_for_week(week_id)?
            .into_iter()
            .map(ChangeEntry::try_from)
            .collect()
    }

    /// Recompute every hash and link.
    pub fn verify_chain(&self) -> AuditResult<ChainStatus> {
        let rows = self.db.list_changes()?;
        let mut expected_prev = String::new();

        for row in &rows {
            let recomputed = entry_hash(
                &row.prev_hash,
                &row.action,
                row.week_id.as_deref(),
                &row.actor,
                &row.payload,
            );
            if row.prev_hash != expected_prev || row.entry_hash != recomputed {
                return Ok(ChainStatus::Broken { seq: row.seq });
            }
            expected_prev = row.entry_hash.clone();
        }

        Ok(ChainStatus::Intact {
            entries: rows.len(),
        })
    }
}

/// Hash one entry.
pub fn entry_hash(
    prev_hash: &str,
    action: &str,
    week_id: Option<&str>,
    actor: &str,
    payload: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [prev_hash, action, week_id.unwrap_or(""), actor, payload] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}
