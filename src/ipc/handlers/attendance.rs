use crate::error::{AttendError, AttendResult};
use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::handlers::StudentIdParam;
use crate::ipc::params::parse_params;
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, CheckInPolicy};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CheckInParams {
    student_id: StudentIdParam,
    #[serde(default)]
    source_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SectionParams {
    section: String,
    #[serde(default)]
    date: Option<String>,
}

fn attendance_check_in(
    state: &mut AppState,
    params: &serde_json::Value,
) -> AttendResult<serde_json::Value> {
    let p: CheckInParams = parse_params(params)?;
    let tz = state
        .config
        .reference_tz()
        .map_err(|e| AttendError::Internal(e.to_string()))?;
    let policy = CheckInPolicy {
        tz,
        max_attempts: state.config.max_check_in_attempts,
        clock: &*state.clock,
    };
    let Some(conn) = state.db.as_mut() else {
        return Err(AttendError::Internal("no open workspace".to_string()));
    };
    let source_ip = p.source_ip.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let record = ledger::check_in(conn, &policy, &p.student_id.into_raw(), source_ip)?;
    Ok(json!({
        "record": record,
        "message": "Attendance marked successfully",
    }))
}

fn attendance_dates(conn: &Connection) -> AttendResult<serde_json::Value> {
    Ok(json!({ "dates": ledger::list_attendance_dates(conn)? }))
}

fn attendance_section(conn: &Connection, params: &serde_json::Value) -> AttendResult<serde_json::Value> {
    let p: SectionParams = parse_params(params)?;
    let section = p.section.trim();
    if section.is_empty() {
        return Err(AttendError::Validation("section is required".to_string()));
    }
    let view = ledger::list_attendance_for_section(conn, section, p.date.as_deref())?;
    serde_json::to_value(view).map_err(|e| AttendError::Internal(e.to_string()))
}

fn handle_attendance_check_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    match attendance_check_in(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_attendance_dates(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_dates(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_attendance_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_section(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.checkIn" => Some(handle_attendance_check_in(state, req)),
        "attendance.dates" => Some(handle_attendance_dates(state, req)),
        "attendance.section" => Some(handle_attendance_section(state, req)),
        _ => None,
    }
}
