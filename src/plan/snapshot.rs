use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::{
    eligibility::rules,
    error::{PlanError, Result},
    plan::{
        coerce,
        course::{normalize, Course, RawCourse},
    },
};

/// A plan document as exchanged with a document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlan {
    #[serde(rename = "DOC_ID", default, deserialize_with = "lenient_string")]
    pub doc_id: Option<String>,
    #[serde(rename = "FACULTAD", default, deserialize_with = "lenient_string")]
    pub faculty: Option<String>,
    #[serde(rename = "CARRERA", default, deserialize_with = "lenient_string")]
    pub program: Option<String>,
    #[serde(
        rename = "NAME",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(rename = "PLAN", default, deserialize_with = "lenient_courses")]
    pub courses: Vec<RawCourse>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce::value_to_string))
}

fn lenient_courses<'de, D>(deserializer: D) -> std::result::Result<Vec<RawCourse>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(other) => {
            debug!("PLAN field is not an array ({}), treating as empty", other);
            return Ok(Vec::new());
        }
        None => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(_) => serde_json::from_value::<RawCourse>(item).ok(),
            other => {
                debug!("Skipping non-object course entry: {}", other);
                None
            }
        })
        .collect())
}

/// An immutable snapshot of a study plan with an index from course code to
/// position. Only the engine flips `passed` on a snapshot it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub doc_id: String,
    pub faculty: String,
    pub program: String,
    pub name: Option<String>,
    courses: Vec<Course>,
    index: HashMap<String, usize>,
}

impl Plan {
    pub fn new(doc_id: impl Into<String>, courses: Vec<Course>) -> Self {
        let raw: Vec<RawCourse> = courses.iter().map(RawCourse::from).collect();
        let courses = normalize(&raw);
        let index = build_index(&courses);
        Self {
            doc_id: doc_id.into(),
            faculty: String::new(),
            program: String::new(),
            name: None,
            courses,
            index,
        }
    }

    pub fn from_raw(raw: &RawPlan) -> Result<Self> {
        let doc_id = raw
            .doc_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlanError::InvalidDocument("DOC_ID missing in plan snapshot".to_string()))?;

        let courses = normalize(&raw.courses);
        let index = build_index(&courses);

        Ok(Self {
            doc_id: doc_id.to_string(),
            faculty: raw.faculty.clone().unwrap_or_default(),
            program: raw.program.clone().unwrap_or_default(),
            name: raw.name.clone().filter(|n| !n.is_empty()),
            courses,
            index,
        })
    }

    pub fn to_raw(&self) -> RawPlan {
        RawPlan {
            doc_id: Some(self.doc_id.clone()),
            faculty: Some(self.faculty.clone()),
            program: Some(self.program.clone()),
            name: self.name.clone(),
            courses: self.courses.iter().map(RawCourse::from).collect(),
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, code: &str) -> Option<&Course> {
        self.index.get(code).map(|&i| &self.courses[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn passed_set(&self) -> HashSet<&str> {
        rules::compute_passed_set(&self.courses)
    }

    pub fn eligible(&self) -> Vec<&str> {
        rules::compute_eligible(&self.courses, &self.passed_set())
    }

    /// Returns false when the code is not in the plan.
    pub(crate) fn set_passed(&mut self, code: &str, passed: bool) -> bool {
        match self.index.get(code) {
            Some(&i) => {
                self.courses[i].passed = passed;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

fn build_index(courses: &[Course]) -> HashMap<String, usize> {
    courses
        .iter()
        .enumerate()
        .map(|(i, c)| (c.code.clone(), i))
        .collect()
}

impl Serialize for Plan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Plan", 5)?;
        state.serialize_field("DOC_ID", &self.doc_id)?;
        state.serialize_field("FACULTAD", &self.faculty)?;
        state.serialize_field("CARRERA", &self.program)?;
        if let Some(name) = &self.name {
            state.serialize_field("NAME", name)?;
        } else {
            state.skip_field("NAME")?;
        }
        state.serialize_field("PLAN", &self.courses)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_reads_wire_names() {
        let raw: RawPlan = serde_json::from_value(json!({
            "DOC_ID": "abc-123",
            "FACULTAD": "INGENIERÍA CIVIL",
            "CARRERA": "Licenciatura en Ingeniería Civil",
            "NAME": "mi plan",
            "PLAN": [
                {"COD_ASIG": 101, "ASIGNATURA": "Física I", "REQUISITOS": []},
                {"COD_ASIG": 102, "ASIGNATURA": "Física II", "REQUISITOS": "101"}
            ]
        }))
        .unwrap();

        let plan = Plan::from_raw(&raw).unwrap();
        assert_eq!(plan.doc_id, "abc-123");
        assert_eq!(plan.faculty, "INGENIERÍA CIVIL");
        assert_eq!(plan.name.as_deref(), Some("mi plan"));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.course("102").unwrap().prerequisites, vec!["101"]);
    }

    #[test]
    fn test_plan_field_not_array_is_empty() {
        let raw: RawPlan = serde_json::from_value(json!({"DOC_ID": 7, "PLAN": "oops"})).unwrap();
        let plan = Plan::from_raw(&raw).unwrap();
        assert_eq!(plan.doc_id, "7");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_non_object_entries_skipped() {
        let raw: RawPlan =
            serde_json::from_value(json!({"DOC_ID": "d", "PLAN": [1, null, {"COD_ASIG": "A"}]})).unwrap();
        assert_eq!(raw.courses.len(), 1);
    }

    #[test]
    fn test_missing_doc_id_rejected() {
        let raw: RawPlan = serde_json::from_value(json!({"PLAN": []})).unwrap();
        assert!(matches!(Plan::from_raw(&raw), Err(PlanError::InvalidDocument(_))));
    }

    #[test]
    fn test_blank_and_padded_prerequisites_block() {
        let raw: RawPlan = serde_json::from_value(json!({
            "DOC_ID": "d",
            "PLAN": [
                {"COD_ASIG": "A", "REQUISITOS": [""]},
                {"COD_ASIG": "B", "REQUISITOS": [" C "]},
                {"COD_ASIG": "C ", "PASSED": true}
            ]
        }))
        .unwrap();

        let plan = Plan::from_raw(&raw).unwrap();
        assert!(plan.eligible().is_empty());

        let dangling = crate::eligibility::dangling_prerequisites(plan.courses());
        let flagged: Vec<&str> = dangling.iter().map(|d| d.course.as_str()).collect();
        assert_eq!(flagged, vec!["A", "B"]);
    }

    #[test]
    fn test_set_passed_uses_index() {
        let mut plan = Plan::new("d", vec![Course::new("A", "a"), Course::new("B", "b")]);
        assert!(plan.set_passed("B", true));
        assert!(!plan.set_passed("Z", true));
        assert!(plan.course("B").unwrap().passed);
        assert!(!plan.course("A").unwrap().passed);
    }

    #[test]
    fn test_serialize_round_trips_through_raw() {
        let plan = Plan::new("d", vec![Course::new("A", "a").with_prerequisites(["B"])]);
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["PLAN"][0]["REQUISITOS"], json!(["B"]));
        assert!(value.get("NAME").is_none());

        let raw: RawPlan = serde_json::from_value(value).unwrap();
        assert_eq!(Plan::from_raw(&raw).unwrap(), plan);
    }
}
