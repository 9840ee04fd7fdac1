use rollcall_core::{EmbedError, Rejection};
use rollcall_store::StoreError;
use thiserror::Error;

/// Failure of an identity or check-in operation.
///
/// [`EngineError::Rejected`] is the recoverable, user-facing outcome; every
/// other variant is a hard failure of storage or the embedding backend.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("rejected: {0}")]
    Rejected(Rejection),
    #[error("storage failure: {0}")]
    Store(StoreError),
    #[error("embedding backend failure: {0}")]
    Backend(EmbedError),
}

impl EngineError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            EngineError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Rejection> for EngineError {
    fn from(r: Rejection) -> Self {
        EngineError::Rejected(r)
    }
}

impl From<EmbedError> for EngineError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::NoFaceDetected { faces } => Rejection::NoFaceDetected { faces }.into(),
            other => EngineError::Backend(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateStudent(student_id) => Rejection::DuplicateIdentity { student_id }.into(),
            StoreError::DuplicateEmail(email) => Rejection::DuplicateIdentity { student_id: email }.into(),
            StoreError::StudentNotFound(student_id) => Rejection::UnknownStudent { student_id }.into(),
            StoreError::DuplicatePresence { lecture_id, .. } => {
                Rejection::AlreadyCheckedIn { lecture: lecture_id }.into()
            }
            other => EngineError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflicts_become_rejections() {
        let e: EngineError = StoreError::DuplicatePresence {
            student_id: "alice".into(),
            lecture_id: "lec1".into(),
            window_key: "2025-09-05".into(),
        }
        .into();
        assert_eq!(e.rejection(), Some(&Rejection::AlreadyCheckedIn { lecture: "lec1".into() }));

        let e: EngineError = StoreError::DuplicateStudent("alice".into()).into();
        assert_eq!(e.rejection().map(Rejection::code), Some("duplicate_identity"));

        let e: EngineError = StoreError::DuplicateEmail("alice@uni.edu".into()).into();
        assert_eq!(
            e.rejection(),
            Some(&Rejection::DuplicateIdentity { student_id: "alice@uni.edu".into() })
        );
    }

    #[test]
    fn test_io_failures_stay_hard_errors() {
        let e: EngineError = StoreError::PasswordHash("bad salt".into()).into();
        assert!(e.rejection().is_none());
        assert!(matches!(e, EngineError::Store(_)));

        let e: EngineError = EmbedError::Backend("session died".into()).into();
        assert!(matches!(e, EngineError::Backend(_)));
    }

    #[test]
    fn test_no_face_is_a_rejection() {
        let e: EngineError = EmbedError::NoFaceDetected { faces: 2 }.into();
        assert_eq!(e.rejection(), Some(&Rejection::NoFaceDetected { faces: 2 }));
    }
}
