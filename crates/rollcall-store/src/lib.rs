//! rollcall-store: SQLite persistence for students, lectures and attendance.
//!
//! All access goes through an explicit [`Database`] handle. The attendance
//! table is append-only and enforces at most one `present` record per
//! (student, lecture, window) with a partial unique index.

pub mod attendance;
pub mod db;
pub mod descriptors;
pub mod error;
pub mod lectures;
pub mod password;
pub mod students;
mod time;

pub use attendance::{AttendanceRecord, DailyCount, DateRange, Outcome, RosterEntry};
pub use db::Database;
pub use descriptors::DescriptorDir;
pub use error::StoreError;
pub use lectures::Lecture;
pub use students::StudentRecord;
