//! API error type shared by the HTTP routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error)]
#[error("[{status}] [{code}] {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_json", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    /// Status for an IPC error code.
    pub fn status_for(code: &str) -> StatusCode {
        match code {
            "bad_params" | "bad_json" | "division_by_zero" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "no_workspace" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Unwraps an IPC reply envelope into its `result`, or the matching error.
    pub fn from_envelope(resp: Value) -> ApiResult<Value> {
        if resp.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(resp.get("result").cloned().unwrap_or_else(|| json!({})));
        }
        let error = resp.get("error");
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            .unwrap_or("internal");
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        Err(Self::new(Self::status_for(code), code, message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = %self.code, "{}", self.message);
        }
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ok_yields_result() {
        let v = ApiError::from_envelope(json!({ "id": "1", "ok": true, "result": { "a": 1 } }))
            .expect("ok");
        assert_eq!(v, json!({ "a": 1 }));
    }

    #[test]
    fn envelope_error_maps_status() {
        let e = ApiError::from_envelope(json!({
            "id": "1",
            "ok": false,
            "error": { "code": "conflict", "message": "Student already exists" }
        }))
        .unwrap_err();
        assert_eq!(e.status, StatusCode::CONFLICT);
        assert_eq!(e.message, "Student already exists");
        assert_eq!(ApiError::status_for("division_by_zero"), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::status_for("db_query_failed"), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
