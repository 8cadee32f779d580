use crate::cgpa::json_number;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_number(req: &Request, key: &str) -> Result<f64, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => {
            Err(err(&req.id, "bad_params", format!("missing {}", key), None))
        }
        Some(v) => json_number(v).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a number", key),
                None,
            )
        }),
    }
}

/// Logs the underlying error and turns it into a `db_query_failed` reply.
pub fn db_failed(req: &Request, e: anyhow::Error) -> Value {
    tracing::error!(method = %req.method, error = %e, "database operation failed");
    err(&req.id, "db_query_failed", e.to_string(), None)
}
