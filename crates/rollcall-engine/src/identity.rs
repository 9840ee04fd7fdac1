//! Identity store: registration, authentication and reference descriptors.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rollcall_core::{Embedding, FaceEmbedder, FaceImage, Rejection};
use rollcall_store::password::{hash_password, verify_dummy, verify_password};
use rollcall_store::{Database, DescriptorDir, StudentRecord};
use serde::Serialize;

/// A registered student, without credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StudentRecord> for Student {
    fn from(r: StudentRecord) -> Self {
        Self {
            student_id: r.student_id,
            name: r.name,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

/// Registration form fields.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub student_id: &'a str,
    pub name: &'a str,
    /// Optional second login name.
    pub email: Option<&'a str>,
    pub password: &'a str,
}

/// Owns the `students` table and the descriptor files it points at.
pub struct IdentityStore<'db> {
    db: &'db Database,
    descriptors: DescriptorDir,
    min_password_len: usize,
}

fn invalid(message: impl Into<String>) -> EngineError {
    Rejection::InvalidInput { message: message.into() }.into()
}

/// Trimmed and lowercased; blank means no email.
fn normalize_email(raw: Option<&str>) -> Result<Option<String>, EngineError> {
    let Some(email) = raw.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(Some(email.to_lowercase())),
        _ => Err(invalid(format!("{email} is not an email address"))),
    }
}

impl<'db> IdentityStore<'db> {
    pub fn new(db: &'db Database, descriptors: DescriptorDir, min_password_len: usize) -> Self {
        Self {
            db,
            descriptors,
            min_password_len: min_password_len.max(1),
        }
    }

    fn check_password_policy(&self, password: &str) -> Result<(), EngineError> {
        if password.chars().count() < self.min_password_len {
            return Err(invalid(format!(
                "password must be at least {} characters long",
                self.min_password_len
            )));
        }
        Ok(())
    }

    /// Register a new student with a reference face taken from `face`.
    pub fn register<E: FaceEmbedder + ?Sized>(
        &self,
        embedder: &mut E,
        form: Registration<'_>,
        face: &FaceImage,
    ) -> Result<Student, EngineError> {
        self.register_at(embedder, form, face, Utc::now())
    }

    pub fn register_at<E: FaceEmbedder + ?Sized>(
        &self,
        embedder: &mut E,
        form: Registration<'_>,
        face: &FaceImage,
        now: DateTime<Utc>,
    ) -> Result<Student, EngineError> {
        let student_id = form.student_id.trim();
        if student_id.is_empty() {
            return Err(invalid("student id is required"));
        }
        self.check_password_policy(form.password)?;
        let email = normalize_email(form.email)?;

        // Cheap checks first so a taken id or email never costs an embedding.
        if self.db.find_student(student_id)?.is_some() {
            return Err(Rejection::DuplicateIdentity {
                student_id: student_id.to_string(),
            }
            .into());
        }
        if let Some(email) = &email {
            if self.db.find_student_by_email(email)?.is_some() {
                return Err(Rejection::DuplicateIdentity {
                    student_id: email.clone(),
                }
                .into());
            }
        }

        let embedding = embedder.detect_and_embed(face)?;
        let password_hash = hash_password(form.password)?;
        let descriptor_path = self.descriptors.write(&embedding)?;

        let record = StudentRecord {
            student_id: student_id.to_string(),
            name: form.name.trim().to_string(),
            email,
            password_hash,
            descriptor_path: descriptor_path.clone(),
            created_at: now,
        };
        if let Err(err) = self.db.insert_student(&record) {
            self.descriptors.discard(&descriptor_path);
            return Err(err.into());
        }

        tracing::info!(student = %record.student_id, dim = embedding.dim(), "student registered");
        Ok(record.into())
    }

    fn find_by_login(&self, login: &str) -> Result<Option<StudentRecord>, EngineError> {
        if let Some(record) = self.db.find_student(login)? {
            return Ok(Some(record));
        }
        if login.contains('@') {
            return Ok(self.db.find_student_by_email(&login.to_lowercase())?);
        }
        Ok(None)
    }

    /// `login` is a student id or a registered email. Unknown logins and
    /// wrong passwords are indistinguishable to the caller, in result and
    /// in hashing cost.
    pub fn authenticate(&self, login: &str, password: &str) -> Result<Student, EngineError> {
        let login = login.trim();
        let Some(record) = self.find_by_login(login)? else {
            verify_dummy(password);
            tracing::info!(student = login, "authentication failed: unknown student");
            return Err(Rejection::InvalidCredentials.into());
        };

        if !verify_password(password, &record.password_hash)? {
            tracing::info!(student = login, "authentication failed: wrong password");
            return Err(Rejection::InvalidCredentials.into());
        }

        Ok(record.into())
    }

    pub fn reference_descriptor(&self, student_id: &str) -> Result<Embedding, EngineError> {
        let record = self
            .db
            .find_student(student_id)?
            .ok_or_else(|| Rejection::UnknownStudent {
                student_id: student_id.to_string(),
            })?;
        Ok(self.descriptors.read(&record.descriptor_path)?)
    }

    /// Replace a student's reference face. Requires their password.
    pub fn reenroll<E: FaceEmbedder + ?Sized>(
        &self,
        embedder: &mut E,
        student_id: &str,
        password: &str,
        face: &FaceImage,
    ) -> Result<Student, EngineError> {
        let student = self.authenticate(student_id, password)?;
        let embedding = embedder.detect_and_embed(face)?;
        let new_path = self.descriptors.write(&embedding)?;

        match self.db.replace_descriptor(&student.student_id, &new_path) {
            Ok(old_path) => {
                self.descriptors.discard(&old_path);
                tracing::info!(student = %student.student_id, "reference face replaced");
                Ok(student)
            }
            Err(err) => {
                self.descriptors.discard(&new_path);
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{capture, FakeEmbedder, ALICE, ALICE_AGAIN, BLANK, BOB, GROUP};

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        descriptors: DescriptorDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let descriptors = DescriptorDir::new(dir.path().join("descriptors"));
        Fixture { db: Database::open_in_memory().unwrap(), descriptors, _dir: dir }
    }

    fn form<'a>(id: &'a str, password: &'a str) -> Registration<'a> {
        Registration { student_id: id, name: "Alice Ade", email: None, password }
    }

    #[test]
    fn test_register_then_authenticate() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        let student = store.register(&mut FakeEmbedder, form("alice", "pw123"), &capture(ALICE)).unwrap();
        assert_eq!(student.student_id, "alice");

        assert_eq!(store.authenticate("alice", "pw123").unwrap().name, "Alice Ade");
        let err = store.authenticate("alice", "wrong").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::InvalidCredentials));
    }

    #[test]
    fn test_login_by_email_or_id() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        let form = Registration { email: Some("  Alice@Uni.edu "), ..form("alice", "pw123") };
        let student = store.register(&mut FakeEmbedder, form, &capture(ALICE)).unwrap();
        assert_eq!(student.email.as_deref(), Some("alice@uni.edu"));

        assert_eq!(store.authenticate("alice", "pw123").unwrap().student_id, "alice");
        assert_eq!(store.authenticate("alice@uni.edu", "pw123").unwrap().student_id, "alice");
        assert_eq!(store.authenticate("ALICE@UNI.EDU", "pw123").unwrap().student_id, "alice");

        let err = store.authenticate("alice@uni.edu", "wrong").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::InvalidCredentials));
        let err = store.authenticate("nobody@uni.edu", "pw123").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::InvalidCredentials));
    }

    #[test]
    fn test_duplicate_email() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        let first = Registration { email: Some("alice@uni.edu"), ..form("alice", "pw123") };
        store.register(&mut FakeEmbedder, first, &capture(ALICE)).unwrap();

        let second = Registration { email: Some("ALICE@uni.edu"), ..form("alice2", "pw") };
        let err = store.register(&mut FakeEmbedder, second, &capture(BOB)).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&Rejection::DuplicateIdentity { student_id: "alice@uni.edu".into() })
        );
        assert!(f.db.find_student("alice2").unwrap().is_none());

        let bad = Registration { email: Some("not-an-email"), ..form("carol", "pw") };
        let err = store.register(&mut FakeEmbedder, bad, &capture(BOB)).unwrap_err();
        assert_eq!(err.rejection().map(Rejection::code), Some("invalid_input"));
    }

    #[test]
    fn test_unknown_student_is_invalid_credentials() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        let err = store.authenticate("ghost", "pw").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::InvalidCredentials));
    }

    #[test]
    fn test_duplicate_identity() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        store.register(&mut FakeEmbedder, form("alice", "pw123"), &capture(ALICE)).unwrap();

        let err = store.register(&mut FakeEmbedder, form("alice", "other"), &capture(BOB)).unwrap_err();
        assert_eq!(err.rejection().map(Rejection::code), Some("duplicate_identity"));
        // The original password still works.
        assert!(store.authenticate("alice", "pw123").is_ok());
    }

    #[test]
    fn test_register_without_single_face() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);

        let err = store.register(&mut FakeEmbedder, form("alice", "pw"), &capture(BLANK)).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::NoFaceDetected { faces: 0 }));
        let err = store.register(&mut FakeEmbedder, form("alice", "pw"), &capture(GROUP)).unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::NoFaceDetected { faces: 2 }));

        assert!(f.db.find_student("alice").unwrap().is_none());
    }

    #[test]
    fn test_input_validation() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 8);

        let err = store.register(&mut FakeEmbedder, form("  ", "longenough"), &capture(ALICE)).unwrap_err();
        assert_eq!(err.rejection().map(Rejection::code), Some("invalid_input"));
        let err = store.register(&mut FakeEmbedder, form("alice", "short"), &capture(ALICE)).unwrap_err();
        assert_eq!(err.rejection().map(Rejection::code), Some("invalid_input"));
    }

    #[test]
    fn test_reference_descriptor() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        store.register(&mut FakeEmbedder, form("alice", "pw123"), &capture(ALICE)).unwrap();

        let reference = store.reference_descriptor("alice").unwrap();
        assert_eq!(reference, FakeEmbedder::embedding_of(ALICE).unwrap());

        let err = store.reference_descriptor("bob").unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::UnknownStudent { student_id: "bob".into() }));
    }

    #[test]
    fn test_reenroll_overwrites_descriptor() {
        let f = fixture();
        let store = IdentityStore::new(&f.db, f.descriptors.clone(), 1);
        store.register(&mut FakeEmbedder, form("alice", "pw123"), &capture(ALICE)).unwrap();
        let old_path = f.db.find_student("alice").unwrap().unwrap().descriptor_path;

        let err = store
            .reenroll(&mut FakeEmbedder, "alice", "nope", &capture(ALICE_AGAIN))
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::InvalidCredentials));

        store.reenroll(&mut FakeEmbedder, "alice", "pw123", &capture(ALICE_AGAIN)).unwrap();
        assert_eq!(
            store.reference_descriptor("alice").unwrap(),
            FakeEmbedder::embedding_of(ALICE_AGAIN).unwrap()
        );
        assert!(!old_path.exists(), "superseded descriptor should be removed");

        // Exactly one descriptor file remains.
        let files = std::fs::read_dir(f.descriptors.root()).unwrap().count();
        assert_eq!(files, 1);
    }
}
