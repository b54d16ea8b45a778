use crate::access;
use crate::error::AttendResult;
use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::params::parse_params;
use crate::ipc::types::{AppState, Request};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddressParams {
    ip_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SetEnabledParams {
    ip_address: String,
    is_enabled: bool,
}

fn ip_rules_list(conn: &Connection) -> AttendResult<serde_json::Value> {
    Ok(json!({ "rules": access::list_rules(conn)? }))
}

fn ip_rules_add(
    conn: &Connection,
    params: &serde_json::Value,
    now: DateTime<Utc>,
) -> AttendResult<serde_json::Value> {
    let p: AddressParams = parse_params(params)?;
    let rule = access::add_rule(conn, &p.ip_address, now)?;
    Ok(json!({ "rule": rule }))
}

fn ip_rules_set_enabled(
    conn: &Connection,
    params: &serde_json::Value,
) -> AttendResult<serde_json::Value> {
    let p: SetEnabledParams = parse_params(params)?;
    let rule = access::set_rule_enabled(conn, &p.ip_address, p.is_enabled)?;
    Ok(json!({ "rule": rule }))
}

fn ip_rules_delete(conn: &Connection, params: &serde_json::Value) -> AttendResult<serde_json::Value> {
    let p: AddressParams = parse_params(params)?;
    access::delete_rule(conn, &p.ip_address)?;
    Ok(json!({ "ok": true }))
}

fn handle_ip_rules_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match ip_rules_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_ip_rules_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match ip_rules_add(conn, &req.params, state.clock.now()) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_ip_rules_set_enabled(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match ip_rules_set_enabled(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

fn handle_ip_rules_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match ip_rules_delete(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.ipRules.list" => Some(handle_ip_rules_list(state, req)),
        "attendance.ipRules.add" => Some(handle_ip_rules_add(state, req)),
        "attendance.ipRules.setEnabled" => Some(handle_ip_rules_set_enabled(state, req)),
        "attendance.ipRules.delete" => Some(handle_ip_rules_delete(state, req)),
        _ => None,
    }
}
