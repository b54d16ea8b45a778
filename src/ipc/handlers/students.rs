use crate::error::AttendResult;
use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::handlers::StudentIdParam;
use crate::ipc::params::parse_params;
use crate::ipc::types::{AppState, Request};
use crate::students;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FindParams {
    student_id: StudentIdParam,
}

fn students_find(conn: &Connection, params: &serde_json::Value) -> AttendResult<serde_json::Value> {
    let p: FindParams = parse_params(params)?;
    let student = students::find_student(conn, &p.student_id.into_raw())?;
    Ok(json!({ "student": student }))
}

fn handle_students_find(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_find(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => attend_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.find" => Some(handle_students_find(state, req)),
        _ => None,
    }
}
