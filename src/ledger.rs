//! Attendance ledger and the check-in pipeline.
//!
//! A check-in runs gate, student lookup, access policy, duplicate check and
//! insert inside one `BEGIN IMMEDIATE` transaction. Immediate mode takes the
//! write lock up front, so two connections can never both observe "no record
//! yet" for the same student and day. `UNIQUE(student_id, date)` backs this up.

use crate::access;
use crate::clock::{civil_date, format_date, format_timestamp, parse_date, Clock};
use crate::error::{is_constraint_violation, AttendError, AttendResult};
use crate::gate;
use crate::students::{self, Student};
use chrono_tz::Tz;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    fn from_db(s: &str) -> Self {
        if s == "present" {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: i64,
    pub date: String,
    pub status: AttendanceStatus,
    pub created_at: String,
}

pub struct CheckInPolicy<'a> {
    pub tz: Tz,
    pub max_attempts: u32,
    pub clock: &'a dyn Clock,
}

pub fn check_in(
    conn: &mut Connection,
    policy: &CheckInPolicy<'_>,
    raw_student_id: &str,
    source_ip: Option<&str>,
) -> AttendResult<AttendanceRecord> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match check_in_once(conn, policy, raw_student_id, source_ip) {
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::debug!(attempt, error = %e, "check-in hit a busy store, retrying");
                attempt += 1;
            }
            Ok(record) => {
                tracing::info!(
                    student_id = record.student_id,
                    date = %record.date,
                    "attendance marked"
                );
                return Ok(record);
            }
            Err(e) => {
                tracing::info!(student_id = raw_student_id, reason = e.code(), "check-in rejected");
                return Err(e);
            }
        }
    }
}

fn check_in_once(
    conn: &mut Connection,
    policy: &CheckInPolicy<'_>,
    raw_student_id: &str,
    source_ip: Option<&str>,
) -> AttendResult<AttendanceRecord> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // A closed gate answers before anything about the student is revealed.
    if !gate::is_check_in_enabled(&tx)? {
        return Err(AttendError::SystemDisabled);
    }

    let student = students::find_student(&tx, raw_student_id)?;

    if !access::is_ip_allowed(&tx, source_ip)? {
        return Err(AttendError::UnauthorizedNetwork);
    }

    let now = policy.clock.now();
    let today = format_date(civil_date(now, policy.tz));

    let existing = tx
        .query_row(
            "SELECT 1 FROM attendance_records WHERE student_id = ? AND date = ?",
            (student.id, &today),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(AttendError::AlreadyMarked);
    }

    let record = AttendanceRecord {
        id: uuid::Uuid::new_v4().to_string(),
        student_id: student.id,
        date: today,
        status: AttendanceStatus::Present,
        created_at: format_timestamp(now),
    };
    tx.execute(
        "INSERT INTO attendance_records(id, student_id, date, status, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &record.id,
            record.student_id,
            &record.date,
            record.status.as_str(),
            &record.created_at,
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AttendError::AlreadyMarked
        } else {
            AttendError::from(e)
        }
    })?;
    tx.commit()?;
    Ok(record)
}

pub fn list_attendance_dates(conn: &Connection) -> AttendResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT date FROM attendance_records ORDER BY date DESC")?;
    let dates = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dates)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRow {
    pub student: Student,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAttendance {
    pub records: Vec<SectionRow>,
    pub has_records: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn list_attendance_for_section(
    conn: &Connection,
    section: &str,
    date: Option<&str>,
) -> AttendResult<SectionAttendance> {
    let date = match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => Some(format_date(parse_date(raw).ok_or_else(|| {
            AttendError::Validation("date must be YYYY-MM-DD".to_string())
        })?)),
        None => None,
    };

    let roster = students::list_students_in_section(conn, section)?;
    if roster.is_empty() {
        return Ok(SectionAttendance {
            records: Vec::new(),
            has_records: false,
            message: Some(format!("No students found in section {}", section)),
        });
    }

    let Some(date) = date else {
        return Ok(SectionAttendance {
            records: roster
                .into_iter()
                .map(|student| SectionRow {
                    student,
                    status: AttendanceStatus::Absent,
                })
                .collect(),
            has_records: false,
            message: Some("No date selected".to_string()),
        });
    };

    let mut stmt = conn.prepare(
        "SELECT ar.student_id, ar.status
         FROM attendance_records ar
         JOIN students s ON s.id = ar.student_id
         WHERE ar.date = ? AND s.section = ?",
    )?;
    let by_student: HashMap<i64, AttendanceStatus> = stmt
        .query_map((&date, section), |r| {
            Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(id, status)| (id, AttendanceStatus::from_db(&status)))
        .collect();

    if by_student.is_empty() {
        return Ok(SectionAttendance {
            records: Vec::new(),
            has_records: false,
            message: Some(format!(
                "No attendance records for section {} on {}",
                section, date
            )),
        });
    }

    let records = roster
        .into_iter()
        .map(|student| {
            let status = by_student
                .get(&student.id)
                .copied()
                .unwrap_or(AttendanceStatus::Absent);
            SectionRow { student, status }
        })
        .collect();
    Ok(SectionAttendance {
        records,
        has_records: true,
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{open_in_memory, seed_student};
    use chrono::{DateTime, TimeZone, Utc};

    fn manila() -> Tz {
        "Asia/Manila".parse().expect("tz")
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = open_in_memory();
        seed_student(&conn, 1001, "Santos", "Maria", "BSIT 1A");
        seed_student(&conn, 1002, "Reyes", "Jose", "BSIT 1A");
        seed_student(&conn, 2001, "Lim", "Ken", "BSIT 1B");
        gate::set_check_in_enabled(&conn, true, at(2024, 3, 1, 0, 0)).expect("enable gate");
        conn
    }

    fn policy(clock: &FixedClock) -> CheckInPolicy<'_> {
        CheckInPolicy {
            tz: manila(),
            max_attempts: 3,
            clock,
        }
    }

    fn record_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM attendance_records", [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn open_policy_accepts_and_dates_in_reference_zone() {
        let mut conn = setup();
        // 17:00 UTC on the 4th is already the 5th in Manila.
        let clock = FixedClock(at(2024, 3, 4, 17, 0));
        let rec = check_in(&mut conn, &policy(&clock), "1001", Some("10.0.0.5")).expect("ok");
        assert_eq!(rec.date, "2024-03-05");
        assert_eq!(rec.status, AttendanceStatus::Present);
        assert_eq!(record_count(&conn), 1);
    }

    #[test]
    fn second_check_in_same_day_is_already_marked() {
        let mut conn = setup();
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        check_in(&mut conn, &policy(&clock), "1001", None).expect("first");
        let later = FixedClock(at(2024, 3, 4, 15, 59));
        assert!(matches!(
            check_in(&mut conn, &policy(&later), "1001", None),
            Err(AttendError::AlreadyMarked)
        ));
        assert_eq!(record_count(&conn), 1);
    }

    #[test]
    fn next_civil_day_is_a_new_check_in() {
        let mut conn = setup();
        let clock = FixedClock(at(2024, 3, 4, 15, 59));
        check_in(&mut conn, &policy(&clock), "1001", None).expect("day one");
        let next = FixedClock(at(2024, 3, 4, 16, 0));
        let rec = check_in(&mut conn, &policy(&next), "1001", None).expect("day two");
        assert_eq!(rec.date, "2024-03-05");
        assert_eq!(record_count(&conn), 2);
    }

    #[test]
    fn disabled_gate_rejects_everything() {
        let mut conn = setup();
        gate::set_check_in_enabled(&conn, false, at(2024, 3, 2, 0, 0)).expect("disable");
        access::add_rule(&conn, "192.168.1.1", at(2024, 3, 2, 0, 0)).expect("rule");
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        for (sid, ip) in [
            ("1001", Some("192.168.1.1")),
            ("1001", Some("10.0.0.5")),
            ("1001", None),
            ("999999", None),
            ("abc", None),
        ] {
            assert!(matches!(
                check_in(&mut conn, &policy(&clock), sid, ip),
                Err(AttendError::SystemDisabled)
            ));
        }
        assert_eq!(record_count(&conn), 0);
    }

    #[test]
    fn gate_never_enabled_is_disabled() {
        let mut conn = open_in_memory();
        seed_student(&conn, 1001, "Santos", "Maria", "BSIT 1A");
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        assert!(matches!(
            check_in(&mut conn, &policy(&clock), "1001", None),
            Err(AttendError::SystemDisabled)
        ));
    }

    #[test]
    fn allowlist_scenario() {
        let mut conn = setup();
        access::add_rule(&conn, "192.168.1.1", at(2024, 3, 2, 0, 0)).expect("rule");
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        assert!(matches!(
            check_in(&mut conn, &policy(&clock), "1001", Some("10.0.0.5")),
            Err(AttendError::UnauthorizedNetwork)
        ));
        assert!(matches!(
            check_in(&mut conn, &policy(&clock), "1001", None),
            Err(AttendError::UnauthorizedNetwork)
        ));
        check_in(&mut conn, &policy(&clock), "1001", Some("192.168.1.1")).expect("allowed");
    }

    #[test]
    fn student_errors_come_first() {
        let mut conn = setup();
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        assert!(matches!(
            check_in(&mut conn, &policy(&clock), "abc", None),
            Err(AttendError::InvalidFormat)
        ));
        assert!(matches!(
            check_in(&mut conn, &policy(&clock), "999999", None),
            Err(AttendError::StudentNotFound)
        ));
    }

    #[test]
    fn rejected_check_in_leaves_no_open_transaction() {
        let mut conn = setup();
        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        let _ = check_in(&mut conn, &policy(&clock), "999999", None);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn concurrent_check_ins_mark_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let conn = crate::db::open_db(dir.path(), std::time::Duration::from_secs(5))
                .expect("open");
            seed_student(&conn, 1001, "Santos", "Maria", "BSIT 1A");
            gate::set_check_in_enabled(&conn, true, at(2024, 3, 1, 0, 0)).expect("enable");
        }

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let mut conn =
                        crate::db::open_db(&path, std::time::Duration::from_secs(5)).expect("open");
                    let clock = FixedClock(at(2024, 3, 4, 1, 0));
                    let policy = CheckInPolicy {
                        tz: manila(),
                        max_attempts: 5,
                        clock: &clock,
                    };
                    check_in(&mut conn, &policy, "1001", Some("10.0.0.5"))
                })
            })
            .collect();

        let results: Vec<_> = workers
            .into_iter()
            .map(|h| h.join().expect("worker"))
            .collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let dup = results
            .iter()
            .filter(|r| matches!(r, Err(AttendError::AlreadyMarked)))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(dup, results.len() - 1);

        let conn = crate::db::open_db(dir.path(), std::time::Duration::from_secs(5)).expect("open");
        assert_eq!(record_count(&conn), 1);
    }

    #[test]
    fn held_write_lock_surfaces_transient_error_after_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let short = std::time::Duration::from_millis(50);
        let mut conn = crate::db::open_db(dir.path(), short).expect("open");
        seed_student(&conn, 1001, "Santos", "Maria", "BSIT 1A");
        gate::set_check_in_enabled(&conn, true, at(2024, 3, 1, 0, 0)).expect("enable");

        let blocker = crate::db::open_db(dir.path(), short).expect("open blocker");
        blocker.execute_batch("BEGIN IMMEDIATE").expect("take write lock");

        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        let policy = CheckInPolicy {
            tz: manila(),
            max_attempts: 2,
            clock: &clock,
        };
        let err = check_in(&mut conn, &policy, "1001", None).expect_err("lock is held");
        assert!(matches!(err, AttendError::TransientStore(_)), "{err:?}");
        assert!(err.is_transient());
        assert!(conn.is_autocommit());

        blocker.execute_batch("ROLLBACK").expect("release");
        assert_eq!(record_count(&conn), 0);
    }

    #[test]
    fn dates_are_distinct_newest_first() {
        let mut conn = setup();
        for (sid, day) in [("1001", 4), ("1002", 4), ("1001", 5)] {
            let clock = FixedClock(at(2024, 3, day, 1, 0));
            check_in(&mut conn, &policy(&clock), sid, None).expect("check in");
        }
        assert_eq!(
            list_attendance_dates(&conn).expect("dates"),
            vec!["2024-03-05", "2024-03-04"]
        );
    }

    #[test]
    fn section_view_branches() {
        let mut conn = setup();

        let empty = list_attendance_for_section(&conn, "NOPE", None).expect("empty section");
        assert!(!empty.has_records);
        assert!(empty.records.is_empty());
        assert_eq!(
            empty.message.as_deref(),
            Some("No students found in section NOPE")
        );

        let roster = list_attendance_for_section(&conn, "BSIT 1A", None).expect("roster");
        assert!(!roster.has_records);
        assert_eq!(roster.records.len(), 2);
        assert!(roster
            .records
            .iter()
            .all(|r| r.status == AttendanceStatus::Absent));

        let none_yet =
            list_attendance_for_section(&conn, "BSIT 1A", Some("2024-03-04")).expect("no records");
        assert!(!none_yet.has_records);
        assert!(none_yet.records.is_empty());

        let clock = FixedClock(at(2024, 3, 4, 1, 0));
        check_in(&mut conn, &policy(&clock), "1001", None).expect("check in");
        check_in(&mut conn, &policy(&clock), "2001", None).expect("other section");

        let view =
            list_attendance_for_section(&conn, "BSIT 1A", Some("2024-03-04")).expect("view");
        assert!(view.has_records);
        let statuses: Vec<(i64, AttendanceStatus)> = view
            .records
            .iter()
            .map(|r| (r.student.id, r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (1002, AttendanceStatus::Absent),
                (1001, AttendanceStatus::Present)
            ]
        );
    }

    #[test]
    fn section_view_rejects_bad_date() {
        let conn = setup();
        assert!(matches!(
            list_attendance_for_section(&conn, "BSIT 1A", Some("03/04/2024")),
            Err(AttendError::Validation(_))
        ));
    }
}
