//! The attendance ledger: append-only check-in records.

use crate::db::Database;
use crate::error::{is_unique_violation, StoreError};
use crate::time::{format_date, format_ts, parse_date, parse_ts};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Present,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Present => "present",
            Outcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Outcome::Present),
            "rejected" => Ok(Outcome::Rejected),
            other => Err(format!("unknown outcome: {other}")),
        }
    }
}

/// One check-in event. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub lecture_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    /// Match distance that produced this record.
    pub score: Option<f32>,
    /// Rejection code, only set for `rejected` records.
    pub reason: Option<String>,
}

impl AttendanceRecord {
    pub fn present(student_id: &str, lecture_id: &str, timestamp: DateTime<Utc>, score: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            lecture_id: lecture_id.to_string(),
            timestamp,
            outcome: Outcome::Present,
            score: Some(score),
            reason: None,
        }
    }

    pub fn rejected(
        student_id: &str,
        lecture_id: &str,
        timestamp: DateTime<Utc>,
        score: Option<f32>,
        reason: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            lecture_id: lecture_id.to_string(),
            timestamp,
            outcome: Outcome::Rejected,
            score,
            reason: Some(reason.to_string()),
        }
    }

    /// UTC calendar date of the check-in.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Inclusive UTC date bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn day(date: NaiveDate) -> Self {
        Self { from: Some(date), to: Some(date) }
    }

    fn bounds(&self) -> (Option<String>, Option<String>) {
        (self.from.map(format_date), self.to.map(format_date))
    }
}

/// A present record joined with the student's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub present: u64,
}

const RECORD_COLUMNS: &str = "id, student_id, lecture_id, timestamp, outcome, score, reason";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let id: String = row.get(0)?;
    let outcome: String = row.get(4)?;
    let score: Option<f64> = row.get(5)?;
    Ok(AttendanceRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        student_id: row.get(1)?,
        lecture_id: row.get(2)?,
        timestamp: parse_ts(3, &row.get::<_, String>(3)?)?,
        outcome: outcome.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
        })?,
        score: score.map(|s| s as f32),
        reason: row.get(6)?,
    })
}

impl Database {
    /// Append a record under `window_key`.
    ///
    /// A second `present` record for the same (student, lecture, window) is
    /// refused by the unique index and reported as [`StoreError::DuplicatePresence`].
    pub fn append_attendance(&self, record: &AttendanceRecord, window_key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO attendance
                   (id, student_id, lecture_id, timestamp, check_in_date, window_key, outcome, score, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    record.student_id,
                    record.lecture_id,
                    format_ts(&record.timestamp),
                    format_date(record.date()),
                    window_key,
                    record.outcome.as_str(),
                    record.score.map(f64::from),
                    record.reason,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicatePresence {
                        student_id: record.student_id.clone(),
                        lecture_id: record.lecture_id.clone(),
                        window_key: window_key.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        tracing::debug!(
            id = %record.id,
            student = %record.student_id,
            lecture = %record.lecture_id,
            outcome = %record.outcome,
            "attendance appended"
        );
        Ok(())
    }

    /// The `present` record for (student, lecture, window), if any.
    pub fn find_present(
        &self,
        student_id: &str,
        lecture_id: &str,
        window_key: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance
             WHERE student_id = ?1 AND lecture_id = ?2 AND window_key = ?3 AND outcome = 'present'"
        );
        Ok(self
            .conn()
            .query_row(&sql, params![student_id, lecture_id, window_key], row_to_record)
            .optional()?)
    }

    /// Records for a lecture, oldest first, optionally bounded by date.
    pub fn attendance_for_lecture(
        &self,
        lecture_id: &str,
        range: DateRange,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let (from, to) = range.bounds();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance
             WHERE lecture_id = ?1
               AND (?2 IS NULL OR check_in_date >= ?2)
               AND (?3 IS NULL OR check_in_date <= ?3)
             ORDER BY timestamp ASC, seq ASC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![lecture_id, from, to], row_to_record)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Present records for a lecture with student names, oldest first.
    pub fn roster(&self, lecture_id: &str, range: DateRange) -> Result<Vec<RosterEntry>, StoreError> {
        let (from, to) = range.bounds();
        let mut stmt = self.conn().prepare(
            "SELECT a.student_id, s.name, a.timestamp, a.score
             FROM attendance a
             JOIN students s ON s.student_id = a.student_id
             WHERE a.lecture_id = ?1 AND a.outcome = 'present'
               AND (?2 IS NULL OR a.check_in_date >= ?2)
               AND (?3 IS NULL OR a.check_in_date <= ?3)
             ORDER BY a.timestamp ASC, a.seq ASC",
        )?;
        let rows = stmt.query_map(params![lecture_id, from, to], |row| {
            let score: Option<f64> = row.get(3)?;
            Ok(RosterEntry {
                student_id: row.get(0)?,
                name: row.get(1)?,
                timestamp: parse_ts(2, &row.get::<_, String>(2)?)?,
                score: score.map(|s| s as f32),
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Present records per day for a lecture, oldest day first.
    pub fn daily_counts(&self, lecture_id: &str) -> Result<Vec<DailyCount>, StoreError> {
        let mut stmt = self.conn().prepare(
            "SELECT check_in_date, COUNT(*) FROM attendance
             WHERE lecture_id = ?1 AND outcome = 'present'
             GROUP BY check_in_date
             ORDER BY check_in_date ASC",
        )?;
        let rows = stmt.query_map(params![lecture_id], |row| {
            let present: i64 = row.get(1)?;
            Ok(DailyCount {
                date: parse_date(0, &row.get::<_, String>(0)?)?,
                present: present as u64,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}
