use crate::auth;
use crate::cgpa::json_number;
use crate::db::{self, NewStudent};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, db_failed, required_number, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

const REGISTER_FIELDS: [&str; 4] = ["name", "email", "level", "target_cgpa"];

/// Payload keys that land in their own columns rather than in `extra_json`.
const COLUMN_FIELDS: [&str; 4] = ["password", "current_cgpa", "events", "feedback"];

fn student_not_found(req: &Request) -> Value {
    err(&req.id, "not_found", "Student not found", None)
}

fn optional_array(req: &Request, key: &str) -> Result<Vec<Value>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be an array", key),
            None,
        )),
    }
}

fn handle_register(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(input) = req.params.as_object() else {
        return err(&req.id, "bad_params", "No JSON data received", None);
    };

    let missing: Vec<&str> = REGISTER_FIELDS
        .iter()
        .copied()
        .filter(|k| input.get(*k).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return err(
            &req.id,
            "bad_params",
            format!("Missing fields. Required: {}", REGISTER_FIELDS.join(", ")),
            Some(json!({ "missing": missing })),
        );
    }

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target_cgpa = match input.get("target_cgpa").and_then(json_number) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "target_cgpa must be a number", None),
    };
    let password = match input.get("password") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        Some(_) => {
            return err(
                &req.id,
                "bad_params",
                "password must be a non-empty string",
                None,
            )
        }
    };

    let current_cgpa = match input.get("current_cgpa") {
        None | Some(Value::Null) => None,
        Some(v) => match json_number(v) {
            Some(n) => Some(n),
            None => return err(&req.id, "bad_params", "current_cgpa must be a number", None),
        },
    };
    let events = match optional_array(req, "events") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match optional_array(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match db::student_exists(conn, &email) {
        Ok(true) => return err(&req.id, "conflict", "Student already exists", None),
        Ok(false) => {}
        Err(e) => return db_failed(req, e),
    }

    let password_hash = match password.map(auth::hash_password).transpose() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "password hashing failed");
            return err(&req.id, "internal", e.to_string(), None);
        }
    };

    let mut extra = input.clone();
    for k in REGISTER_FIELDS.iter().chain(COLUMN_FIELDS.iter()) {
        extra.remove(*k);
    }
    let student = NewStudent {
        name,
        email,
        level: input.get("level").cloned().unwrap_or(Value::Null),
        target_cgpa,
        current_cgpa,
        password_hash,
        extra,
        events,
        feedback,
    };

    match db::insert_student(conn, &student) {
        Ok(id) => {
            tracing::info!(email = %student.email, "student registered");
            ok(
                &req.id,
                json!({
                    "message": "Student registered successfully",
                    "id": id
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "student insert failed");
            err(&req.id, "db_insert_failed", e.to_string(), None)
        }
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(password) = req.params.get("password").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing password", None);
    };

    let record = match db::find_student(conn, &email) {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "unauthorized", "invalid email or password", None),
        Err(e) => return db_failed(req, e),
    };
    let Some(stored) = record.password_hash.as_deref() else {
        return err(
            &req.id,
            "unauthorized",
            "no password is set for this student",
            None,
        );
    };
    match auth::verify_password(stored, password) {
        Ok(true) => {
            tracing::info!(email = %record.email, "student logged in");
            ok(
                &req.id,
                json!({
                    "message": "Login successful",
                    "id": record.id,
                    "student": record.to_document()
                }),
            )
        }
        Ok(false) => err(&req.id, "unauthorized", "invalid email or password", None),
        Err(e) => {
            tracing::error!(email = %record.email, error = %e, "stored password hash unreadable");
            err(&req.id, "internal", e.to_string(), None)
        }
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::find_student(conn, &email) {
        Ok(Some(r)) => ok(&req.id, r.to_document()),
        Ok(None) => student_not_found(req),
        Err(e) => db_failed(req, e),
    }
}

fn handle_events_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::find_student(conn, &email) {
        Ok(Some(r)) => ok(&req.id, json!({ "events": r.events })),
        Ok(None) => student_not_found(req),
        Err(e) => db_failed(req, e),
    }
}

fn handle_events_set(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let events = match req.params.get("events") {
        None | Some(Value::Null) => return err(&req.id, "bad_params", "missing events", None),
        Some(Value::Array(items)) => items,
        Some(_) => return err(&req.id, "bad_params", "events must be an array", None),
    };
    match db::set_events(conn, &email, events) {
        Ok(true) => {
            tracing::debug!(email = %email, count = events.len(), "events replaced");
            ok(&req.id, json!({ "message": "Events added successfully" }))
        }
        Ok(false) => student_not_found(req),
        Err(e) => db_failed(req, e),
    }
}

fn handle_cgpa_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let current = match required_number(req, "current_cgpa") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::set_current_cgpa(conn, &email, current) {
        Ok(true) => ok(&req.id, json!({ "message": "CGPA updated successfully" })),
        Ok(false) => student_not_found(req),
        Err(e) => db_failed(req, e),
    }
}

fn handle_feedback_submit(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match req.params.get("feedback") {
        None | Some(Value::Null) => return err(&req.id, "bad_params", "missing feedback", None),
        Some(v) => v,
    };
    match db::push_feedback(conn, &email, feedback) {
        Ok(true) => ok(&req.id, json!({ "message": "Feedback submitted successfully" })),
        Ok(false) => student_not_found(req),
        Err(e) => db_failed(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.register" => Some(handle_register(state, req)),
        "students.login" => Some(handle_login(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "events.list" => Some(handle_events_list(state, req)),
        "events.set" => Some(handle_events_set(state, req)),
        "cgpa.update" => Some(handle_cgpa_update(state, req)),
        "feedback.submit" => Some(handle_feedback_submit(state, req)),
        _ => None,
    }
}
