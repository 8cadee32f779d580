use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    /// Scan order used by the planner: highest point value first.
    pub const SCALE: [Grade; 6] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::E, Grade::F];

    pub fn point(self) -> f64 {
        match self {
            Grade::A => 5.0,
            Grade::B => 4.0,
            Grade::C => 3.0,
            Grade::D => 2.0,
            Grade::E => 1.0,
            Grade::F => 0.0,
        }
    }

    pub fn letter(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }

    /// Letter band for a required average point (progress page thresholds).
    pub fn for_required_average(avg: f64) -> Self {
        if avg >= 4.5 {
            Grade::A
        } else if avg >= 3.5 {
            Grade::B
        } else if avg >= 2.5 {
            Grade::C
        } else if avg >= 1.5 {
            Grade::D
        } else if avg >= 1.0 {
            Grade::E
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("total units must not be zero")]
    DivisionByZero,
}

impl PlanError {
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::InvalidRequest(_) => "bad_params",
            PlanError::DivisionByZero => "division_by_zero",
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        PlanError::InvalidRequest(message.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub name: String,
    pub unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub subject: String,
    pub recommended_grade: String,
}

/// Terminal state of one subject in the scan.
///
/// Only `Accepted` appends to the ledger. A `Fallback` subject is reported
/// as "F" but contributes nothing to later trial averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Grade),
    Fallback,
}

impl Outcome {
    pub fn grade(self) -> Grade {
        match self {
            Outcome::Accepted(g) => g,
            Outcome::Fallback => Grade::F,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub subject: String,
    pub unit: f64,
    pub point: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectOutcome {
    pub subject: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub total_units: f64,
    pub outcomes: Vec<SubjectOutcome>,
    pub accepted: Vec<LedgerEntry>,
}

impl Plan {
    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.outcomes
            .iter()
            .map(|o| Recommendation {
                subject: o.subject.clone(),
                recommended_grade: o.outcome.grade().letter().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub target_cgpa: f64,
    pub subjects: Vec<Subject>,
}

impl PlanRequest {
    pub fn from_json(params: &Value) -> Result<Self, PlanError> {
        let target_cgpa = match params.get("target_cgpa") {
            None | Some(Value::Null) => return Err(PlanError::invalid("missing target_cgpa")),
            Some(v) => json_number(v)
                .ok_or_else(|| PlanError::invalid("target_cgpa must be a number"))?,
        };

        let raw_subjects = match params.get("subjects") {
            None | Some(Value::Null) => return Err(PlanError::invalid("missing subjects")),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(PlanError::invalid("subjects must be an array")),
        };
        if raw_subjects.is_empty() {
            return Err(PlanError::invalid("subjects must not be empty"));
        }

        let mut subjects = Vec::with_capacity(raw_subjects.len());
        for (i, raw) in raw_subjects.iter().enumerate() {
            let Some(obj) = raw.as_object() else {
                return Err(PlanError::invalid(format!("subjects[{}] must be an object", i)));
            };
            let name = match obj.get("name") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => {
                    return Err(PlanError::invalid(format!("subjects[{}].name is required", i)))
                }
                Some(_) => {
                    return Err(PlanError::invalid(format!(
                        "subjects[{}].name must be a string",
                        i
                    )))
                }
            };
            let unit = match obj.get("unit") {
                Some(Value::Null) | None => {
                    return Err(PlanError::invalid(format!("subjects[{}].unit is required", i)))
                }
                Some(v) => json_number(v).ok_or_else(|| {
                    PlanError::invalid(format!("subjects[{}].unit must be a number", i))
                })?,
            };
            subjects.push(Subject { name, unit });
        }

        Ok(Self {
            target_cgpa,
            subjects,
        })
    }
}

/// Accepts JSON numbers and numeric strings ("4.5"), which the signup form sends.
pub fn json_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn trial_cgpa(accepted: &[LedgerEntry], point: f64, unit: f64, total_units: f64) -> f64 {
    let weighted: f64 = accepted
        .iter()
        .map(|e| e.point * e.unit)
        .chain(std::iter::once(point * unit))
        .sum();
    weighted / total_units
}

/// Greedy, order-dependent grade recommendation.
///
/// `total_units` is fixed over the whole input before the scan starts. Each
/// subject takes the first grade (A first) whose trial average over the
/// ledger plus itself reaches `target_cgpa`; otherwise it falls back to "F"
/// without entering the ledger.
pub fn plan(target_cgpa: f64, subjects: &[Subject]) -> Result<Plan, PlanError> {
    if !target_cgpa.is_finite() {
        return Err(PlanError::invalid("target_cgpa must be a finite number"));
    }
    if subjects.is_empty() {
        return Err(PlanError::invalid("subjects must not be empty"));
    }
    for (i, s) in subjects.iter().enumerate() {
        if !s.unit.is_finite() || s.unit < 0.0 {
            return Err(PlanError::invalid(format!(
                "subjects[{}].unit must be a non-negative number",
                i
            )));
        }
    }

    let total_units: f64 = subjects.iter().map(|s| s.unit).sum();
    if total_units == 0.0 {
        return Err(PlanError::DivisionByZero);
    }
    if !total_units.is_finite() {
        return Err(PlanError::invalid("total units overflow"));
    }

    let mut accepted: Vec<LedgerEntry> = Vec::new();
    let mut outcomes = Vec::with_capacity(subjects.len());

    for subject in subjects {
        let mut outcome = Outcome::Fallback;
        for grade in Grade::SCALE {
            let point = grade.point();
            if trial_cgpa(&accepted, point, subject.unit, total_units) >= target_cgpa {
                accepted.push(LedgerEntry {
                    subject: subject.name.clone(),
                    unit: subject.unit,
                    point,
                    grade,
                });
                outcome = Outcome::Accepted(grade);
                break;
            }
        }
        outcomes.push(SubjectOutcome {
            subject: subject.name.clone(),
            outcome,
        });
    }

    Ok(Plan {
        total_units,
        outcomes,
        accepted,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterRequirement {
    pub required_average: f64,
    pub average_grade: String,
    pub points_needed: i64,
    pub new_units: f64,
}

/// Average grade point the upcoming courses need for the cumulative
/// average to land on `target_cgpa`.
pub fn semester_requirement(
    current_cgpa: f64,
    completed_units: f64,
    target_cgpa: f64,
    course_units: &[f64],
) -> Result<SemesterRequirement, PlanError> {
    for (key, v) in [
        ("current_cgpa", current_cgpa),
        ("completed_units", completed_units),
        ("target_cgpa", target_cgpa),
    ] {
        if !v.is_finite() || v <= 0.0 {
            return Err(PlanError::invalid(format!("{} must be a positive number", key)));
        }
    }
    if course_units.is_empty() {
        return Err(PlanError::invalid("courses must not be empty"));
    }
    if let Some(i) = course_units
        .iter()
        .position(|u| !u.is_finite() || *u <= 0.0)
    {
        return Err(PlanError::invalid(format!(
            "courses[{}].unit must be a positive number",
            i
        )));
    }

    let new_units: f64 = course_units.iter().sum();
    if !new_units.is_finite() {
        return Err(PlanError::invalid("total course units overflow"));
    }

    let completed_points = current_cgpa * completed_units;
    let target_points = target_cgpa * (completed_units + new_units);
    let required_points = target_points - completed_points;
    let required_average = required_points / new_units;

    Ok(SemesterRequirement {
        required_average,
        average_grade: Grade::for_required_average(required_average)
            .letter()
            .to_string(),
        points_needed: required_points.ceil() as i64,
        new_units,
    })
}
