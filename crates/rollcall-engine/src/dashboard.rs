//! Read-only views over the attendance ledger.

use crate::error::EngineError;
use crate::pipeline::lecture_code;
use rollcall_store::{AttendanceRecord, DailyCount, Database, DateRange, Lecture, RosterEntry};

/// Lecture codes are matched after the same trimming check-in applies.
pub struct DashboardReader<'db> {
    db: &'db Database,
}

impl<'db> DashboardReader<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Every record for `lecture`, oldest first. Ties keep insertion order.
    pub fn list_attendance(
        &self,
        lecture: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        Ok(self
            .db
            .attendance_for_lecture(lecture_code(lecture), range.unwrap_or_default())?)
    }

    /// Newest first.
    pub fn list_lectures(&self) -> Result<Vec<Lecture>, EngineError> {
        Ok(self.db.list_lectures()?)
    }

    pub fn roster(&self, lecture: &str, range: Option<DateRange>) -> Result<Vec<RosterEntry>, EngineError> {
        Ok(self.db.roster(lecture_code(lecture), range.unwrap_or_default())?)
    }

    pub fn daily_summary(&self, lecture: &str) -> Result<Vec<DailyCount>, EngineError> {
        Ok(self.db.daily_counts(lecture_code(lecture))?)
    }
}
