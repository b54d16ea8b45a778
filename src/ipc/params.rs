use crate::error::{AttendError, AttendResult};
use serde::de::DeserializeOwned;

/// Decodes `params` into a typed request. A missing `params` reads as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> AttendResult<T> {
    let value = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|e| AttendError::Validation(format!("bad params: {}", e)))
}
