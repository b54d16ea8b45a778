use crate::error::{AttendError, AttendResult};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_initial: String,
    pub section: String,
    pub email: String,
}

impl Student {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: r.get(0)?,
            first_name: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
            last_name: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
            middle_initial: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
            section: r.get(4)?,
            email: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
        })
    }
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, middle_initial, section, email";

pub fn parse_student_id(raw: &str) -> AttendResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AttendError::InvalidFormat)
}

/// Works on a plain connection or inside an open transaction.
pub fn find_student(conn: &Connection, raw_id: &str) -> AttendResult<Student> {
    let id = parse_student_id(raw_id)?;
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
        [id],
        Student::from_row,
    )
    .optional()?
    .ok_or(AttendError::StudentNotFound)
}

pub fn list_students_in_section(conn: &Connection, section: &str) -> AttendResult<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM students
         WHERE section = ?
         ORDER BY last_name, first_name, id",
        STUDENT_COLUMNS
    ))?;
    let students = stmt
        .query_map([section], Student::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}
