use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_academicd");
    let mut child = Command::new(exe)
        .env_remove("ACADEMICD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn academicd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn grades(resp: &serde_json::Value) -> Vec<String> {
    resp.get("result")
        .and_then(|r| r.get("recommendations"))
        .and_then(|v| v.as_array())
        .expect("recommendations")
        .iter()
        .map(|r| {
            r.get("recommendedGrade")
                .and_then(|v| v.as_str())
                .expect("recommendedGrade")
                .to_string()
        })
        .collect()
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn plan_runs_without_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "cgpa.plan",
        json!({
            "target_cgpa": 4.0,
            "subjects": [
                { "name": "CS101", "unit": 3 },
                { "name": "MTH102", "unit": 2 }
            ]
        }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true), "{}", resp);
    assert_eq!(
        resp["result"],
        json!({
            "recommendations": [
                { "subject": "CS101", "recommendedGrade": "F" },
                { "subject": "MTH102", "recommendedGrade": "F" }
            ]
        })
    );

    let single = request(
        &mut stdin,
        &mut reader,
        "2",
        "cgpa.plan",
        json!({ "target_cgpa": 3.0, "subjects": [{ "name": "X", "unit": 1 }] }),
    );
    assert_eq!(grades(&single), vec!["A"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn plan_keeps_input_order_and_boundary() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // First subject alone reaches exactly 3.0 and must be accepted.
    let boundary = request(
        &mut stdin,
        &mut reader,
        "1",
        "cgpa.plan",
        json!({
            "target_cgpa": 3.0,
            "subjects": [
                { "name": "X", "unit": 3 },
                { "name": "Y", "unit": 2 }
            ]
        }),
    );
    assert_eq!(grades(&boundary), vec!["A", "A"]);

    let reordered = request(
        &mut stdin,
        &mut reader,
        "2",
        "cgpa.plan",
        json!({
            "target_cgpa": 3.0,
            "subjects": [
                { "name": "Small", "unit": 1 },
                { "name": "Big", "unit": 4 }
            ]
        }),
    );
    assert_eq!(grades(&reordered), vec!["F", "A"]);
    let names: Vec<_> = reordered["result"]["recommendations"]
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["subject"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["Small", "Big"]);

    let again = request(
        &mut stdin,
        &mut reader,
        "3",
        "cgpa.plan",
        json!({
            "target_cgpa": 3.0,
            "subjects": [
                { "name": "Small", "unit": 1 },
                { "name": "Big", "unit": 4 }
            ]
        }),
    );
    assert_eq!(again["result"], reordered["result"]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn plan_rejects_invalid_requests() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let cases = [
        json!({ "subjects": [{ "name": "a", "unit": 1 }] }),
        json!({ "target_cgpa": 3.0 }),
        json!({ "target_cgpa": 3.0, "subjects": [] }),
        json!({ "target_cgpa": "abc", "subjects": [{ "name": "a", "unit": 1 }] }),
        json!({ "target_cgpa": 3.0, "subjects": [{ "name": "a" }] }),
        json!({ "target_cgpa": 3.0, "subjects": [{ "name": "a", "unit": -2 }] }),
    ];
    for (i, params) in cases.iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad-{}", i),
            "cgpa.plan",
            params.clone(),
        );
        assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(error_code(&resp), Some("bad_params"), "case {}: {}", i, resp);
    }

    let zero = request(
        &mut stdin,
        &mut reader,
        "zero",
        "cgpa.plan",
        json!({
            "target_cgpa": 3.0,
            "subjects": [{ "name": "a", "unit": 0 }, { "name": "b", "unit": 0 }]
        }),
    );
    assert_eq!(error_code(&zero), Some("division_by_zero"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn requirement_reports_needed_average() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "cgpa.requirement",
        json!({
            "current_cgpa": 3.0,
            "completed_units": 30,
            "target_cgpa": 3.5,
            "courses": [
                { "course": "CS201", "unit": 10 },
                { "course": "MTH201", "unit": 5 }
            ]
        }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true), "{}", resp);
    assert_eq!(resp["result"]["averageGrade"], json!("A"));
    assert_eq!(resp["result"]["pointsNeeded"], json!(68));
    assert_eq!(resp["result"]["newUnits"], json!(15.0));

    let missing = request(
        &mut stdin,
        &mut reader,
        "2",
        "cgpa.requirement",
        json!({ "current_cgpa": 3.0, "target_cgpa": 3.5, "courses": [] }),
    );
    assert_eq!(error_code(&missing), Some("bad_params"));

    let zero_unit = request(
        &mut stdin,
        &mut reader,
        "3",
        "cgpa.requirement",
        json!({
            "current_cgpa": 3.0,
            "completed_units": 10,
            "target_cgpa": 3.0,
            "courses": [
                { "course": "GST101", "unit": 0 },
                { "course": "CS201", "unit": 3 }
            ]
        }),
    );
    assert_eq!(error_code(&zero_unit), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}
