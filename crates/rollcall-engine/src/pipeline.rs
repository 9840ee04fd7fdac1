//! Check-in pipeline: credentials, face match, duplicate check, ledger append.
//!
//! ```text
//! Idle → Authenticating → Matching → DuplicateCheck → Recording → Done
//!              └──────────────┴─────────────┴────────────┴──→ Rejected
//! ```
//!
//! The caller supplies an already decoded capture. Each run is synchronous
//! and never retried.

use crate::config::DuplicateWindow;
use crate::error::EngineError;
use crate::identity::IdentityStore;
use chrono::{DateTime, SubsecRound, Utc};
use rollcall_core::{FaceEmbedder, FaceImage, FaceMatcher, MatchResult, Rejection};
use rollcall_store::{AttendanceRecord, Database};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInState {
    Idle,
    Authenticating,
    Matching,
    DuplicateCheck,
    Recording,
    Done,
    Rejected,
}

impl fmt::Display for CheckInState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckInState::Idle => "idle",
            CheckInState::Authenticating => "authenticating",
            CheckInState::Matching => "matching",
            CheckInState::DuplicateCheck => "duplicate_check",
            CheckInState::Recording => "recording",
            CheckInState::Done => "done",
            CheckInState::Rejected => "rejected",
        })
    }
}

/// Canonical form of a lecture code as stored in the ledger.
pub(crate) fn lecture_code(raw: &str) -> &str {
    raw.trim()
}

#[derive(Debug, Clone, Copy)]
pub struct CheckInRequest<'a> {
    pub student_id: &'a str,
    pub password: &'a str,
    /// Lecture code. Unknown codes are created on the first successful check-in.
    pub lecture: &'a str,
    /// Title stored when the lecture is created. Ignored afterwards.
    pub lecture_title: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckInPolicy {
    pub window: DuplicateWindow,
    /// Append face mismatches as `rejected` records.
    pub audit_rejections: bool,
}

pub struct CheckInPipeline<'db, E> {
    identity: IdentityStore<'db>,
    db: &'db Database,
    matcher: FaceMatcher<E>,
    policy: CheckInPolicy,
    state: CheckInState,
}

impl<'db, E: FaceEmbedder> CheckInPipeline<'db, E> {
    pub fn new(
        identity: IdentityStore<'db>,
        db: &'db Database,
        matcher: FaceMatcher<E>,
        policy: CheckInPolicy,
    ) -> Self {
        Self {
            identity,
            db,
            matcher,
            policy,
            state: CheckInState::Idle,
        }
    }

    pub fn identity(&self) -> &IdentityStore<'db> {
        &self.identity
    }

    /// State reached by the most recent run. A hard failure leaves the
    /// state it happened in.
    pub fn last_state(&self) -> CheckInState {
        self.state
    }

    pub fn check_in(
        &mut self,
        req: &CheckInRequest<'_>,
        image: &FaceImage,
    ) -> Result<AttendanceRecord, EngineError> {
        self.check_in_at(req, image, Utc::now())
    }

    /// Like [`check_in`](Self::check_in) with an explicit clock.
    ///
    /// `now` is truncated to the ledger's microsecond precision, so the
    /// returned record equals the stored one.
    pub fn check_in_at(
        &mut self,
        req: &CheckInRequest<'_>,
        image: &FaceImage,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        let now = now.trunc_subsecs(6);
        self.state = CheckInState::Idle;
        let result = self.run(req, image, now);

        match &result {
            Ok(record) => {
                self.transition(CheckInState::Done);
                tracing::info!(
                    student = %record.student_id,
                    lecture = %record.lecture_id,
                    distance = record.score,
                    "checked in"
                );
            }
            Err(EngineError::Rejected(rejection)) => {
                self.transition(CheckInState::Rejected);
                tracing::info!(
                    student = req.student_id,
                    lecture = req.lecture,
                    reason = rejection.code(),
                    "check-in rejected"
                );
            }
            Err(err) => {
                tracing::error!(
                    student = req.student_id,
                    lecture = req.lecture,
                    state = %self.state,
                    error = %err,
                    "check-in failed"
                );
            }
        }
        result
    }

    fn transition(&mut self, next: CheckInState) {
        tracing::debug!(from = %self.state, to = %next, "check-in state");
        self.state = next;
    }

    fn run(
        &mut self,
        req: &CheckInRequest<'_>,
        image: &FaceImage,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        let lecture = lecture_code(req.lecture);
        if lecture.is_empty() {
            return Err(Rejection::InvalidInput {
                message: "lecture code is required".into(),
            }
            .into());
        }

        self.transition(CheckInState::Authenticating);
        let student = self.identity.authenticate(req.student_id, req.password)?;
        let student_id = student.student_id.as_str();

        self.transition(CheckInState::Matching);
        let reference = self.identity.reference_descriptor(student_id)?;
        let result = self.matcher.compare(image, &reference)?;
        if !result.is_match {
            if self.policy.audit_rejections {
                self.audit_mismatch(student_id, lecture, req.lecture_title, now, &result)?;
            }
            return Err(Rejection::FaceMismatch {
                distance: result.distance,
                threshold: result.threshold,
            }
            .into());
        }

        self.transition(CheckInState::DuplicateCheck);
        let window_key = self.policy.window.key_for(now);
        if self.db.find_present(student_id, lecture, &window_key)?.is_some() {
            return Err(Rejection::AlreadyCheckedIn {
                lecture: lecture.to_string(),
            }
            .into());
        }

        self.transition(CheckInState::Recording);
        self.db.ensure_lecture(lecture, req.lecture_title, now.date_naive())?;
        let record = AttendanceRecord::present(student_id, lecture, now, result.distance);
        // A concurrent writer may have won since the duplicate check; the
        // unique index turns that into AlreadyCheckedIn.
        self.db.append_attendance(&record, &window_key)?;
        Ok(record)
    }

    fn audit_mismatch(
        &self,
        student_id: &str,
        lecture: &str,
        title: Option<&str>,
        now: DateTime<Utc>,
        result: &MatchResult,
    ) -> Result<(), EngineError> {
        self.db.ensure_lecture(lecture, title, now.date_naive())?;
        let record = AttendanceRecord::rejected(
            student_id,
            lecture,
            now,
            Some(result.distance),
            "face_mismatch",
        );
        self.db.append_attendance(&record, &self.policy.window.key_for(now))?;
        Ok(())
    }
}
