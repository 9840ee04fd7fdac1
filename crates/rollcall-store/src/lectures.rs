use crate::db::Database;
use crate::error::StoreError;
use crate::time::{format_date, parse_date};
use chrono::NaiveDate;
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lecture {
    pub code: String,
    pub title: Option<String>,
    pub created_on: NaiveDate,
}

impl Database {
    /// Create the lecture if it does not exist yet. An existing title is never overwritten.
    pub fn ensure_lecture(
        &self,
        code: &str,
        title: Option<&str>,
        created_on: NaiveDate,
    ) -> Result<(), StoreError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO lectures (code, title, created_on) VALUES (?1, ?2, ?3)",
            params![code, title, format_date(created_on)],
        )?;
        if inserted > 0 {
            tracing::info!(lecture = code, title = ?title, "lecture created");
        }
        Ok(())
    }

    /// All lectures, newest first.
    pub fn list_lectures(&self) -> Result<Vec<Lecture>, StoreError> {
        let mut stmt = self.conn().prepare(
            "SELECT code, title, created_on FROM lectures ORDER BY created_on DESC, code ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Lecture {
                code: row.get(0)?,
                title: row.get(1)?,
                created_on: parse_date(2, &row.get::<_, String>(2)?)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    #[test]
    fn test_ensure_lecture_keeps_first_title() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_lecture("CS101", Some("Intro to CS"), day(5)).unwrap();
        db.ensure_lecture("CS101", Some("Renamed"), day(6)).unwrap();

        let lectures = db.list_lectures().unwrap();
        assert_eq!(
            lectures,
            vec![Lecture {
                code: "CS101".into(),
                title: Some("Intro to CS".into()),
                created_on: day(5),
            }]
        );
    }

    #[test]
    fn test_list_lectures_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_lecture("MTH201", None, day(1)).unwrap();
        db.ensure_lecture("CS101", None, day(9)).unwrap();
        db.ensure_lecture("PHY110", None, day(4)).unwrap();

        let codes: Vec<_> = db.list_lectures().unwrap().into_iter().map(|l| l.code).collect();
        assert_eq!(codes, ["CS101", "PHY110", "MTH201"]);
    }
}
