use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("student {0} already exists")]
    DuplicateStudent(String),
    #[error("email {0} is already registered")]
    DuplicateEmail(String),
    #[error("student {0} not found")]
    StudentNotFound(String),
    #[error("a present record already exists for {student_id} in {lecture_id} ({window_key})")]
    DuplicatePresence {
        student_id: String,
        lecture_id: String,
        window_key: String,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("descriptor file {path} is corrupt: {source}")]
    DescriptorFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("unsupported schema version {found} (expected at most {supported})")]
    SchemaVersion { found: i64, supported: i64 },
}

/// True for UNIQUE / PRIMARY KEY violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
