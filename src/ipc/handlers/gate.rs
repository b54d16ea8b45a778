use crate::error::AttendResult;
use crate::gate;
use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::params::parse_params;
use crate::ipc::types::{AppState, Request};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SetParams {
    is_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HistoryParams {
    #[serde(default)]
    limit: Option<u32>,
}

fn gate_get(conn: &Connection) -> AttendResult<serde_json::Value> {
    Ok(json!({ "isEnabled": gate::is_check_in_enabled(conn)? }))
}

fn gate_set(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> AttendResult<serde_json::Value> {
    let p: SetParams = parse_params(params)?;
    gate::set_check_in_enabled(conn, p.is_enabled, now)?;
    Ok(json!({ "isEnabled": p.is_enabled }))
}

fn gate_history(conn: &Connection, params: &serde_json::Value) -> AttendResult<serde_json::Value> {
    let p: HistoryParams = parse_params(params)?;
    let entries = gate::gate_history(conn, p.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?;
    Ok(json!({ "entries": entries }))
}

fn handle_gate_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gate_get(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_gate_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gate_set(conn, &req.params, state.clock.now()) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_gate_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match gate_history(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.gate.get" => Some(handle_gate_get(state, req)),
        "attendance.gate.set" => Some(handle_gate_set(state, req)),
        "attendance.gate.history" => Some(handle_gate_history(state, req)),
        _ => None,
    }
}
