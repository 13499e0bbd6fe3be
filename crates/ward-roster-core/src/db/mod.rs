//! Database layer for the ward roster.

mod schema;
mod audit;
mod doctors;
mod schedule;
mod weeks;

pub use schema::*;
pub use audit::*;
#[allow(unused_imports)]
pub use doctors::*;
#[allow(unused_imports)]
pub use schedule::*;
#[allow(unused_imports)]
pub use weeks::*;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Turn SQLite constraint failures into `Constraint`, keeping other errors as-is.
    pub(crate) fn from_write(err: rusqlite::Error, context: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                DbError::Constraint(format!(
                    "{}: {}",
                    context,
                    msg.as_deref().unwrap_or("constraint failed")
                ))
            }
            _ => DbError::Sqlite(err),
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `f` reads anything, so status checks made
    /// inside `f` cannot be invalidated by another writer before commit. Any error
    /// returned by `f` rolls the whole transaction back.
    pub fn write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Database) -> Result<T, E>,
        E: From<DbError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"doctors".to_string()));
        assert!(tables.contains(&"weeks".to_string()));
        assert!(tables.contains(&"slot_assignments".to_string()));
        assert!(tables.contains(&"absences".to_string()));
        assert!(tables.contains(&"change_log".to_string()));
    }

    #[test]
    fn test_write_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();

        let result: DbResult<()> = db.write_transaction(|db| {
            db.conn().execute(
                "INSERT INTO doctors (doctor_id, name) VALUES ('d1', 'Dr. Adler')",
                [],
            )?;
            Err(DbError::Constraint("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_write_transaction_commits() {
        let db = Database::open_in_memory().unwrap();

        db.write_transaction(|db| -> DbResult<()> {
            db.conn().execute(
                "INSERT INTO doctors (doctor_id, name) VALUES ('d1', 'Dr. Adler')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM doctors", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.db");

        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO doctors (doctor_id, name) VALUES ('d1', 'Dr. Adler')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let name: String = db
            .conn()
            .query_row("SELECT name FROM doctors WHERE doctor_id = 'd1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Dr. Adler");
    }
}
