//! Database handle and schema.

use crate::error::StoreError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const SCHEMA_VERSION: i64 = 2;

const SCHEMA_V1: &str = r"
CREATE TABLE IF NOT EXISTS students (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  student_id TEXT NOT NULL UNIQUE,
  name TEXT NOT NULL,
  password_hash TEXT NOT NULL,
  descriptor_path TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lectures (
  code TEXT PRIMARY KEY,
  title TEXT,
  created_on TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT NOT NULL UNIQUE,
  student_id TEXT NOT NULL REFERENCES students(student_id),
  lecture_id TEXT NOT NULL REFERENCES lectures(code),
  timestamp TEXT NOT NULL,
  check_in_date TEXT NOT NULL,
  window_key TEXT NOT NULL,
  outcome TEXT NOT NULL CHECK (outcome IN ('present', 'rejected')),
  score REAL,
  reason TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_present_once
  ON attendance(student_id, lecture_id, window_key)
  WHERE outcome = 'present';

CREATE INDEX IF NOT EXISTS idx_attendance_lecture_time
  ON attendance(lecture_id, timestamp, seq);

CREATE TRIGGER IF NOT EXISTS trg_attendance_no_update
BEFORE UPDATE ON attendance
BEGIN
  SELECT RAISE(FAIL, 'attendance is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_attendance_no_delete
BEFORE DELETE ON attendance
BEGIN
  SELECT RAISE(FAIL, 'attendance is append-only');
END;
";

// v2: optional login email, unique when present.
const MIGRATION_V2: &str = r"
ALTER TABLE students ADD COLUMN email TEXT;
CREATE UNIQUE INDEX IF NOT EXISTS idx_students_email ON students(email);
";

/// Owned handle to the attendance database.
///
/// Components borrow it; there is no process-wide connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");

        Self::init(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(SCHEMA_V1)?;
        if version < 2 {
            conn.execute_batch(MIGRATION_V2)?;
        }
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::info!(from = version, to = SCHEMA_VERSION, "migrated schema");
        }

        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}
