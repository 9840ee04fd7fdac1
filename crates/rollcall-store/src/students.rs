use crate::db::Database;
use crate::error::{is_unique_violation, StoreError};
use crate::time::{format_ts, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// A row of the `students` table.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    /// Optional login alias, stored lowercased. Unique when present.
    pub email: Option<String>,
    pub password_hash: String,
    pub descriptor_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

const STUDENT_COLUMNS: &str = "student_id, name, email, password_hash, descriptor_path, created_at";

fn row_to_student(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    let descriptor: String = row.get(4)?;
    Ok(StudentRecord {
        student_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        descriptor_path: PathBuf::from(descriptor),
        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
    })
}

fn is_email_conflict(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("students.email"))
}

impl Database {
    pub fn insert_student(&self, student: &StudentRecord) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO students (student_id, name, email, password_hash, descriptor_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    student.student_id,
                    student.name,
                    student.email,
                    student.password_hash,
                    student.descriptor_path.to_string_lossy(),
                    format_ts(&student.created_at),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) && is_email_conflict(&e) {
                    StoreError::DuplicateEmail(student.email.clone().unwrap_or_default())
                } else if is_unique_violation(&e) {
                    StoreError::DuplicateStudent(student.student_id.clone())
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    pub fn find_student(&self, student_id: &str) -> Result<Option<StudentRecord>, StoreError> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![student_id], row_to_student)
            .optional()?)
    }

    /// Lookup by the stored (lowercased) email.
    pub fn find_student_by_email(&self, email: &str) -> Result<Option<StudentRecord>, StoreError> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE email = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![email], row_to_student)
            .optional()?)
    }

    /// Point a student at a new descriptor file, returning the old path.
    pub fn replace_descriptor(
        &self,
        student_id: &str,
        descriptor_path: &Path,
    ) -> Result<PathBuf, StoreError> {
        let old = self
            .find_student(student_id)?
            .ok_or_else(|| StoreError::StudentNotFound(student_id.to_string()))?
            .descriptor_path;
        self.conn().execute(
            "UPDATE students SET descriptor_path = ?1 WHERE student_id = ?2",
            params![descriptor_path.to_string_lossy(), student_id],
        )?;
        Ok(old)
    }

    pub fn student_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn student(id: &str) -> StudentRecord {
        StudentRecord {
            student_id: id.to_string(),
            name: format!("Student {id}"),
            email: None,
            password_hash: "$argon2id$stub".into(),
            descriptor_path: PathBuf::from(format!("/tmp/{id}.json")),
            created_at: Utc.with_ymd_and_hms(2025, 9, 5, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student("CSC/22D/4441")).unwrap();

        let found = db.find_student("CSC/22D/4441").unwrap().unwrap();
        assert_eq!(found.name, "Student CSC/22D/4441");
        assert_eq!(found.created_at, Utc.with_ymd_and_hms(2025, 9, 5, 8, 0, 0).unwrap());
        assert!(db.find_student("nobody").unwrap().is_none());
        assert_eq!(db.student_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_student() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student("alice")).unwrap();
        let err = db.insert_student(&student("alice")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateStudent(id) if id == "alice"));
    }

    #[test]
    fn test_email_lookup_and_uniqueness() {
        let db = Database::open_in_memory().unwrap();
        let alice = StudentRecord { email: Some("alice@uni.edu".into()), ..student("alice") };
        db.insert_student(&alice).unwrap();
        // Several students without an email are fine.
        db.insert_student(&student("bob")).unwrap();
        db.insert_student(&student("carol")).unwrap();

        let found = db.find_student_by_email("alice@uni.edu").unwrap().unwrap();
        assert_eq!(found.student_id, "alice");
        assert_eq!(db.find_student("alice").unwrap().unwrap().email.as_deref(), Some("alice@uni.edu"));
        assert!(db.find_student_by_email("bob@uni.edu").unwrap().is_none());

        let dave = StudentRecord { email: Some("alice@uni.edu".into()), ..student("dave") };
        let err = db.insert_student(&dave).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(ref e) if e == "alice@uni.edu"));
        assert!(db.find_student("dave").unwrap().is_none());
    }

    #[test]
    fn test_replace_descriptor() {
        let db = Database::open_in_memory().unwrap();
        db.insert_student(&student("alice")).unwrap();
        let old = db
            .replace_descriptor("alice", Path::new("/tmp/new.json"))
            .unwrap();
        assert_eq!(old, PathBuf::from("/tmp/alice.json"));
        let now = db.find_student("alice").unwrap().unwrap();
        assert_eq!(now.descriptor_path, PathBuf::from("/tmp/new.json"));

        let err = db
            .replace_descriptor("bob", Path::new("/tmp/x.json"))
            .unwrap_err();
        assert!(matches!(err, StoreError::StudentNotFound(_)));
    }
}
