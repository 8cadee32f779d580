use crate::cgpa::{self, json_number, PlanError, PlanRequest};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_number;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn plan_error(req: &Request, e: PlanError) -> Value {
    tracing::debug!(method = %req.method, error = %e, "planner rejected request");
    err(&req.id, e.code(), e.to_string(), None)
}

fn handle_plan(_state: &mut AppState, req: &Request) -> Value {
    let input = match PlanRequest::from_json(&req.params) {
        Ok(v) => v,
        Err(e) => return plan_error(req, e),
    };
    let plan = match cgpa::plan(input.target_cgpa, &input.subjects) {
        Ok(p) => p,
        Err(e) => return plan_error(req, e),
    };
    tracing::debug!(
        subjects = input.subjects.len(),
        total_units = plan.total_units,
        accepted = ?plan
            .accepted
            .iter()
            .map(|e| format!("{}={}", e.subject, e.grade))
            .collect::<Vec<_>>(),
        "cgpa plan computed"
    );
    ok(
        &req.id,
        json!({ "recommendations": plan.recommendations() }),
    )
}

/// Unit column of `courses: [{course, unit}]`.
fn parse_course_units(req: &Request) -> Result<Vec<f64>, Value> {
    let items = match req.params.get("courses") {
        None | Some(Value::Null) => {
            return Err(err(&req.id, "bad_params", "missing courses", None))
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(err(&req.id, "bad_params", "courses must be an array", None))
        }
    };
    let mut units = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(unit) = item.get("unit").and_then(json_number) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("courses[{}].unit must be a number", i),
                None,
            ));
        };
        units.push(unit);
    }
    Ok(units)
}

fn handle_requirement(_state: &mut AppState, req: &Request) -> Value {
    let current_cgpa = match required_number(req, "current_cgpa") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let completed_units = match required_number(req, "completed_units") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let target_cgpa = match required_number(req, "target_cgpa") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_units = match parse_course_units(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match cgpa::semester_requirement(current_cgpa, completed_units, target_cgpa, &course_units) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => plan_error(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "cgpa.plan" => Some(handle_plan(state, req)),
        "cgpa.requirement" => Some(handle_requirement(state, req)),
        _ => None,
    }
}
