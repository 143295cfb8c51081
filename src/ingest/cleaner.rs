use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::{PlanError, Result},
    plan::{RawCourse, RawPlan},
};

/// Strip the typed wrappers document analysis puts around every field.
///
/// An object carrying a `type` key is replaced by its `valueString`,
/// `valueNumber`, `valueBoolean`, `valueArray` or `valueObject` payload (or
/// null when none is present). Plain objects and arrays are cleaned
/// recursively.
pub fn clean_value(field: &Value) -> Value {
    match field {
        Value::Object(map) if map.contains_key("type") => {
            if let Some(v) = map.get("valueString") {
                v.clone()
            } else if let Some(v) = map.get("valueNumber") {
                v.clone()
            } else if let Some(v) = map.get("valueBoolean") {
                v.clone()
            } else if let Some(Value::Array(items)) = map.get("valueArray") {
                Value::Array(items.iter().map(clean_value).collect())
            } else if let Some(v) = map.get("valueObject") {
                clean_value(v)
            } else {
                Value::Null
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), clean_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clean_value).collect()),
        other => other.clone(),
    }
}

fn field(item: &Value, key: &str) -> Option<Value> {
    item.get(key).filter(|v| !v.is_null()).cloned()
}

/// Pick the course fields out of a cleaned plan row.
pub fn clean_course(item: &Value) -> RawCourse {
    RawCourse {
        number: field(item, "NUM_ASIG"),
        code: field(item, "COD_ASIG"),
        name: field(item, "ASIGNATURA"),
        prerequisites: Some(field(item, "REQUISITOS").unwrap_or_else(|| Value::Array(Vec::new()))),
        fundamental: Some(field(item, "FUNDAMENTAL").unwrap_or(Value::Bool(false))),
        year: field(item, "AÑO"),
        term: field(item, "SEMESTRE"),
        passed: None,
    }
}

/// Turn one analyzed content block into a plan payload.
pub fn clean_document(content: &Value) -> RawPlan {
    let fields = content
        .get("fields")
        .map(clean_value)
        .unwrap_or_else(|| Value::Object(Map::new()));

    let courses: Vec<RawCourse> = match fields.get("PLAN") {
        Some(Value::Array(items)) => items.iter().map(clean_course).collect(),
        _ => Vec::new(),
    };

    let text = |key: &str| fields.get(key).and_then(crate::plan::coerce::value_to_string);

    RawPlan {
        doc_id: text("DOC_ID"),
        faculty: text("FACULTAD"),
        program: text("CARRERA"),
        name: None,
        courses,
    }
}

/// Extract the plan from a full analyzer response
/// (`result.contents[0]`).
pub fn extract_plan(analyzer_output: &Value) -> Result<RawPlan> {
    let content = analyzer_output
        .pointer("/result/contents/0")
        .ok_or_else(|| PlanError::InvalidDocument("analyzer returned no contents".to_string()))?;

    let plan = clean_document(content);
    if plan.doc_id.as_deref().map_or(true, str::is_empty) {
        return Err(PlanError::InvalidDocument(
            "DOC_ID missing in extracted document".to_string(),
        ));
    }

    debug!(
        "Extracted plan {:?} with {} courses",
        plan.doc_id,
        plan.courses.len()
    );
    Ok(plan)
}
