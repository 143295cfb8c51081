use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::plan::coerce;

/// A course record as it arrives from a document store.
///
/// Every field is kept as raw JSON; `normalize` is the only place that
/// interprets the shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCourse {
    #[serde(rename = "NUM_ASIG", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<Value>,
    #[serde(rename = "COD_ASIG", default)]
    pub code: Option<Value>,
    #[serde(rename = "ASIGNATURA", default)]
    pub name: Option<Value>,
    #[serde(rename = "REQUISITOS", default)]
    pub prerequisites: Option<Value>,
    #[serde(rename = "FUNDAMENTAL", default)]
    pub fundamental: Option<Value>,
    #[serde(rename = "AÑO", default)]
    pub year: Option<Value>,
    #[serde(rename = "SEMESTRE", default)]
    pub term: Option<Value>,
    #[serde(rename = "PASSED", default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<Value>,
}

/// One curriculum entry in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "NUM_ASIG", default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(rename = "COD_ASIG")]
    pub code: String,
    #[serde(rename = "ASIGNATURA")]
    pub name: String,
    #[serde(rename = "REQUISITOS")]
    pub prerequisites: Vec<String>,
    #[serde(rename = "FUNDAMENTAL")]
    pub is_fundamental: bool,
    #[serde(rename = "AÑO")]
    pub year: String,
    #[serde(rename = "SEMESTRE")]
    pub term: String,
    #[serde(rename = "PASSED")]
    pub passed: bool,
}

impl Course {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            number: None,
            code: code.into(),
            name: name.into(),
            prerequisites: Vec::new(),
            is_fundamental: false,
            year: String::new(),
            term: String::new(),
            passed: false,
        }
    }

    pub fn with_prerequisites<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_placement(mut self, year: impl Into<String>, term: impl Into<String>) -> Self {
        self.year = year.into();
        self.term = term.into();
        self
    }

    pub fn passed(mut self, passed: bool) -> Self {
        self.passed = passed;
        self
    }

    /// Canonicalize a single raw record.
    pub fn from_raw(raw: &RawCourse) -> Self {
        Self {
            number: coerce::value_to_i64(raw.number.as_ref()),
            code: coerce::opt_to_string(raw.code.as_ref()),
            name: coerce::opt_to_string(raw.name.as_ref()),
            prerequisites: coerce::value_to_codes(raw.prerequisites.as_ref()),
            is_fundamental: coerce::value_to_bool(raw.fundamental.as_ref()),
            year: coerce::opt_to_string(raw.year.as_ref()),
            term: coerce::opt_to_string(raw.term.as_ref()),
            passed: coerce::value_to_bool(raw.passed.as_ref()),
        }
    }
}

impl From<&Course> for RawCourse {
    fn from(course: &Course) -> Self {
        Self {
            number: course.number.map(Value::from),
            code: Some(Value::String(course.code.clone())),
            name: Some(Value::String(course.name.clone())),
            prerequisites: Some(Value::Array(
                course.prerequisites.iter().cloned().map(Value::String).collect(),
            )),
            fundamental: Some(Value::Bool(course.is_fundamental)),
            year: Some(Value::String(course.year.clone())),
            term: Some(Value::String(course.term.clone())),
            passed: Some(Value::Bool(course.passed)),
        }
    }
}

/// Canonicalize raw course records.
///
/// Never fails. Malformed fields fall back to empty/false defaults, records
/// without a code are skipped and a repeated course code keeps its first
/// occurrence. Codes are kept verbatim.
pub fn normalize(raw_courses: &[RawCourse]) -> Vec<Course> {
    let mut seen = HashSet::with_capacity(raw_courses.len());
    let mut courses = Vec::with_capacity(raw_courses.len());

    for raw in raw_courses {
        let course = Course::from_raw(raw);
        if course.code.trim().is_empty() {
            warn!("Skipping course record without a code: {:?}", raw.name);
            continue;
        }
        if !seen.insert(course.code.clone()) {
            warn!("Dropping duplicate course code {}", course.code);
            continue;
        }
        courses.push(course);
    }

    courses
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawCourse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scalar_prerequisite_becomes_sequence() {
        let courses = normalize(&[raw(json!({"COD_ASIG": 201, "REQUISITOS": "101"}))]);
        assert_eq!(courses[0].code, "201");
        assert_eq!(courses[0].prerequisites, vec!["101"]);
    }

    #[test]
    fn test_null_prerequisites_become_empty() {
        let courses = normalize(&[raw(json!({"COD_ASIG": "101", "REQUISITOS": null}))]);
        assert!(courses[0].prerequisites.is_empty());

        let courses = normalize(&[raw(json!({"COD_ASIG": "101"}))]);
        assert!(courses[0].prerequisites.is_empty());
    }

    #[test]
    fn test_sequence_prerequisites_unchanged() {
        let courses = normalize(&[raw(json!({"COD_ASIG": "301", "REQUISITOS": ["101", "102"]}))]);
        assert_eq!(courses[0].prerequisites, vec!["101", "102"]);
    }

    #[test]
    fn test_passed_coerced_to_bool() {
        let courses = normalize(&[
            raw(json!({"COD_ASIG": "A", "PASSED": 1})),
            raw(json!({"COD_ASIG": "B", "PASSED": null})),
            raw(json!({"COD_ASIG": "C", "PASSED": "true"})),
            raw(json!({"COD_ASIG": "D"})),
        ]);
        let flags: Vec<bool> = courses.iter().map(|c| c.passed).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_placement_and_metadata() {
        let courses = normalize(&[raw(json!({
            "NUM_ASIG": 4,
            "COD_ASIG": "0707",
            "ASIGNATURA": "Cálculo I",
            "FUNDAMENTAL": true,
            "AÑO": 1,
            "SEMESTRE": "II"
        }))]);
        let c = &courses[0];
        assert_eq!(c.number, Some(4));
        assert_eq!(c.code, "0707");
        assert_eq!(c.name, "Cálculo I");
        assert!(c.is_fundamental);
        assert_eq!(c.year, "1");
        assert_eq!(c.term, "II");
    }

    #[test]
    fn test_duplicate_codes_keep_first() {
        let courses = normalize(&[
            raw(json!({"COD_ASIG": "A", "ASIGNATURA": "first"})),
            raw(json!({"COD_ASIG": "A", "ASIGNATURA": "second"})),
        ]);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "first");
    }

    #[test]
    fn test_codeless_records_skipped() {
        let courses = normalize(&[
            raw(json!({"ASIGNATURA": "sin código"})),
            raw(json!({"COD_ASIG": "A"})),
            raw(json!({"COD_ASIG": "  ", "ASIGNATURA": "en blanco"})),
            raw(json!({"COD_ASIG": null, "ASIGNATURA": "nulo"})),
        ]);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].code, "A");
    }

    #[test]
    fn test_codes_kept_verbatim() {
        let courses = normalize(&[
            raw(json!({"COD_ASIG": "A", "REQUISITOS": [""]})),
            raw(json!({"COD_ASIG": "B", "REQUISITOS": [" C "]})),
            raw(json!({"COD_ASIG": "C ", "PASSED": true})),
        ]);
        assert_eq!(courses[0].prerequisites, vec![""]);
        assert_eq!(courses[1].prerequisites, vec![" C "]);
        assert_eq!(courses[2].code, "C ");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = vec![
            raw(json!({"COD_ASIG": 101.0, "REQUISITOS": null, "PASSED": "yes", "AÑO": 1})),
            raw(json!({"COD_ASIG": "102", "REQUISITOS": 101, "FUNDAMENTAL": 0})),
            raw(json!({"COD_ASIG": "103", "REQUISITOS": ["101", 102, "101"]})),
            raw(json!({"REQUISITOS": {"unexpected": true}})),
        ];

        let once = normalize(&input);
        let round: Vec<RawCourse> = once.iter().map(RawCourse::from).collect();
        let twice = normalize(&round);
        assert_eq!(once, twice);
    }
}
