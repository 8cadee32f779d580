use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "academicd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            level_json TEXT NOT NULL,
            target_cgpa REAL NOT NULL,
            current_cgpa REAL,
            password_hash TEXT,
            extra_json TEXT NOT NULL DEFAULT '{}',
            events_json TEXT NOT NULL DEFAULT '[]',
            feedback_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(email)",
        [],
    )?;

    Ok(conn)
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub level: Value,
    pub target_cgpa: f64,
    pub current_cgpa: Option<f64>,
    pub password_hash: Option<String>,
    pub extra: Map<String, Value>,
    pub events: Vec<Value>,
    pub feedback: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub level: Value,
    pub target_cgpa: f64,
    pub current_cgpa: Option<f64>,
    pub password_hash: Option<String>,
    pub extra: Map<String, Value>,
    pub events: Vec<Value>,
    pub feedback: Vec<Value>,
}

impl StudentRecord {
    /// Public view of the record: no row id, no password hash.
    pub fn to_document(&self) -> Value {
        let mut doc = self.extra.clone();
        doc.insert("name".into(), Value::String(self.name.clone()));
        doc.insert("email".into(), Value::String(self.email.clone()));
        doc.insert("level".into(), self.level.clone());
        doc.insert("target_cgpa".into(), Value::from(self.target_cgpa));
        if let Some(c) = self.current_cgpa {
            doc.insert("current_cgpa".into(), Value::from(c));
        }
        doc.insert("events".into(), Value::Array(self.events.clone()));
        doc.insert("feedback".into(), Value::Array(self.feedback.clone()));
        Value::Object(doc)
    }
}

pub fn student_exists(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE email = ?", [email], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_student(conn: &Connection, s: &NewStudent) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let ts = now_ts();
    conn.execute(
        "INSERT INTO students(
            id, email, name, level_json, target_cgpa, current_cgpa, password_hash,
            extra_json, events_json, feedback_json, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            s.email,
            s.name,
            serde_json::to_string(&s.level)?,
            s.target_cgpa,
            s.current_cgpa,
            s.password_hash,
            serde_json::to_string(&s.extra)?,
            serde_json::to_string(&s.events)?,
            serde_json::to_string(&s.feedback)?,
            ts,
            ts
        ],
    )?;
    Ok(id)
}

fn parse_json_or<T: serde::de::DeserializeOwned>(
    email: &str,
    column: &str,
    raw: &str,
    fallback: T,
) -> T {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(email, column, error = %e, "corrupt JSON column, using empty value");
            fallback
        }
    }
}

pub fn find_student(conn: &Connection, email: &str) -> anyhow::Result<Option<StudentRecord>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, level_json, target_cgpa, current_cgpa, password_hash,
                    extra_json, events_json, feedback_json
             FROM students
             WHERE email = ?",
            [email],
            |r| {
                let level_raw: String = r.get(3)?;
                let extra_raw: String = r.get(7)?;
                let events_raw: String = r.get(8)?;
                let feedback_raw: String = r.get(9)?;
                let email: String = r.get(2)?;
                Ok(StudentRecord {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    level: parse_json_or(&email, "level_json", &level_raw, Value::Null),
                    target_cgpa: r.get(4)?,
                    current_cgpa: r.get(5)?,
                    password_hash: r.get(6)?,
                    extra: parse_json_or(&email, "extra_json", &extra_raw, Map::new()),
                    events: parse_json_or(&email, "events_json", &events_raw, Vec::new()),
                    feedback: parse_json_or(&email, "feedback_json", &feedback_raw, Vec::new()),
                    email,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Returns false when no student has this email.
pub fn set_events(conn: &Connection, email: &str, events: &[Value]) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE students SET events_json = ?, updated_at = ? WHERE email = ?",
        params![serde_json::to_string(events)?, now_ts(), email],
    )?;
    Ok(changed > 0)
}

pub fn set_current_cgpa(conn: &Connection, email: &str, cgpa: f64) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE students SET current_cgpa = ?, updated_at = ? WHERE email = ?",
        params![cgpa, now_ts(), email],
    )?;
    Ok(changed > 0)
}

pub fn push_feedback(conn: &Connection, email: &str, feedback: &Value) -> anyhow::Result<bool> {
    // json_insert with '$[#]' appends in place.
    let changed = conn.execute(
        "UPDATE students
         SET feedback_json = json_insert(feedback_json, '$[#]', json(?)), updated_at = ?
         WHERE email = ?",
        params![serde_json::to_string(feedback)?, now_ts(), email],
    )?;
    Ok(changed > 0)
}
