//! REST routes. Each one forwards to the IPC router so both transports
//! share a single implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::error::{ApiError, ApiResult};
use crate::ipc::{self, AppState, Request};

/// `rusqlite::Connection` is not `Sync`, so the whole state sits behind a mutex.
#[derive(Clone)]
pub struct HttpState {
    pub app: Arc<Mutex<AppState>>,
}

impl HttpState {
    pub fn new(app: AppState) -> Self {
        Self {
            app: Arc::new(Mutex::new(app)),
        }
    }

    fn dispatch(&self, method: &str, params: Value) -> ApiResult<Value> {
        let req = Request::new(Uuid::new_v4().to_string(), method, params);
        let mut app = self
            .app
            .lock()
            .map_err(|_| ApiError::internal("application state lock poisoned"))?;
        ApiError::from_envelope(ipc::handle_request(&mut app, req))
    }
}

fn parse_body(body: &Bytes) -> ApiResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("No JSON data received"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON: {}", e)))
}

fn email_query(q: &HashMap<String, String>) -> Value {
    json!({ "email": q.get("email") })
}

async fn health(State(state): State<HttpState>) -> ApiResult<Json<Value>> {
    state.dispatch("health", json!({})).map(Json)
}

async fn register(
    State(state): State<HttpState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let params = parse_body(&body)?;
    let result = state.dispatch("students.register", params)?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn login(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("students.login", parse_body(&body)?).map(Json)
}

async fn get_student(
    State(state): State<HttpState>,
    Query(q): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    state.dispatch("students.get", email_query(&q)).map(Json)
}

async fn list_events(
    State(state): State<HttpState>,
    Query(q): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    state.dispatch("events.list", email_query(&q)).map(Json)
}

async fn set_events(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("events.set", parse_body(&body)?).map(Json)
}

async fn update_cgpa(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("cgpa.update", parse_body(&body)?).map(Json)
}

async fn submit_feedback(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("feedback.submit", parse_body(&body)?).map(Json)
}

async fn plan_cgpa(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("cgpa.plan", parse_body(&body)?).map(Json)
}

async fn cgpa_requirement(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Value>> {
    state.dispatch("cgpa.requirement", parse_body(&body)?).map(Json)
}

pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/student", get(get_student))
        .route("/events", get(list_events).post(set_events))
        .route("/update-cgpa", post(update_cgpa))
        .route("/feedback", post(submit_feedback))
        .route("/plan-cgpa", post(plan_cgpa))
        .route("/cgpa-requirement", post(cgpa_requirement))
        .with_state(state)
}
