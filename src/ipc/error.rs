use crate::error::AttendError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Turns a domain error into the wire shape. Internal detail is logged, not sent.
pub fn attend_err(id: &str, method: &str, e: &AttendError) -> serde_json::Value {
    if let AttendError::Internal(detail) = e {
        tracing::error!(request_id = id, method, detail = %detail, "request failed");
    }
    let details = match e {
        AttendError::TransientStore(_) => Some(json!({ "retryable": true })),
        _ => None,
    };
    err(id, e.code(), e.user_message(), details)
}
