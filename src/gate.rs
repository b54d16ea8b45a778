//! The system-wide check-in switch.
//!
//! Stored as an append-only log in `attendance_control`; the newest row is the
//! effective state and an empty log means disabled.

use crate::clock::format_timestamp;
use crate::error::AttendResult;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEntry {
    pub is_enabled: bool,
    pub updated_at: String,
}

pub fn is_check_in_enabled(conn: &Connection) -> AttendResult<bool> {
    let latest: Option<i64> = conn
        .query_row(
            "SELECT is_enabled FROM attendance_control
             ORDER BY updated_at DESC, rowid DESC
             LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(latest.map(|v| v != 0).unwrap_or(false))
}

pub fn set_check_in_enabled(
    conn: &Connection,
    enabled: bool,
    now: DateTime<Utc>,
) -> AttendResult<()> {
    conn.execute(
        "INSERT INTO attendance_control(id, is_enabled, updated_at) VALUES(?, ?, ?)",
        (
            uuid::Uuid::new_v4().to_string(),
            enabled as i64,
            format_timestamp(now),
        ),
    )?;
    tracing::info!(enabled, "attendance gate toggled");
    Ok(())
}

pub fn gate_history(conn: &Connection, limit: u32) -> AttendResult<Vec<GateEntry>> {
    let mut stmt = conn.prepare(
        "SELECT is_enabled, updated_at FROM attendance_control
         ORDER BY updated_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let entries = stmt
        .query_map([limit], |r| {
            Ok(GateEntry {
                is_enabled: r.get::<_, i64>(0)? != 0,
                updated_at: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
