use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "timezone": state.config.timezone,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "validation_error", "missing params.path", None);
    };

    // A workspace may carry its own attendd.toml; the CLI timezone still wins.
    let config = state
        .base_config
        .merged_with_workspace(&path)
        .and_then(|mut c| {
            if let Some(tz) = &state.timezone_override {
                c.timezone = tz.clone();
            }
            c.validate()?;
            Ok(c)
        });
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "workspace config rejected");
            return err(&req.id, "config_invalid", format!("{e:#}"), None);
        }
    };

    match db::open_db(&path, Duration::from_millis(config.busy_timeout_ms)) {
        Ok(conn) => {
            tracing::info!(path = %path.display(), timezone = %config.timezone, "workspace opened");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            state.config = config;
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to open workspace db");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
