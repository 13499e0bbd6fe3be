//! SQLite schema definition.

/// Complete database schema for the ward roster.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Doctors
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    user_profile_id TEXT,                        -- NULL unless linked to a login
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_doctors_active ON doctors(active, name);

-- ============================================================================
-- Weeks (unit of mutability and approval)
-- ============================================================================

CREATE TABLE IF NOT EXISTS weeks (
    week_id TEXT PRIMARY KEY,
    week_start TEXT NOT NULL UNIQUE,             -- Monday, YYYY-MM-DD
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'approved')),
    approved_at TEXT,
    approved_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Slot Assignments (replaced wholesale on save)
-- ============================================================================

CREATE TABLE IF NOT EXISTS slot_assignments (
    week_id TEXT NOT NULL REFERENCES weeks(week_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    slot TEXT NOT NULL CHECK (slot IN ('AM', 'PM')),
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id),
    role TEXT NOT NULL CHECK (role IN ('ADMISSIONS', 'WARD')),
    UNIQUE (week_id, date, slot, doctor_id)
);

-- One admissions doctor per slot
CREATE UNIQUE INDEX IF NOT EXISTS idx_slot_single_admissions
    ON slot_assignments(week_id, date, slot) WHERE role = 'ADMISSIONS';

CREATE INDEX IF NOT EXISTS idx_slot_assignments_doctor ON slot_assignments(doctor_id);

-- ============================================================================
-- Absences
-- ============================================================================

CREATE TABLE IF NOT EXISTS absences (
    week_id TEXT NOT NULL REFERENCES weeks(week_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    slot TEXT NOT NULL CHECK (slot IN ('AM', 'PM')),
    doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id),
    reason TEXT NOT NULL,                        -- unknown codes read back as OTHER
    note TEXT,
    UNIQUE (week_id, date, slot, doctor_id)
);

CREATE INDEX IF NOT EXISTS idx_absences_doctor ON absences(doctor_id);

-- ============================================================================
-- Change Log (Append-Only, hash chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS change_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    week_id TEXT,                                -- not a foreign key: outlives deleted weeks
    action TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- JSON
    prev_hash TEXT NOT NULL,
    entry_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_change_log_week ON change_log(week_id);

CREATE TRIGGER IF NOT EXISTS change_log_no_update BEFORE UPDATE ON change_log
BEGIN
    SELECT RAISE(ABORT, 'change_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS change_log_no_delete BEFORE DELETE ON change_log
BEGIN
    SELECT RAISE(ABORT, 'change_log is append-only');
END;
"#;
