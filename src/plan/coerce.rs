//! Lenient conversions from loosely-typed JSON values.
//!
//! Document payloads come from an extraction pipeline, so the same field can
//! show up as a string, a number or not at all. These helpers never fail;
//! anything unusable becomes an empty/false default.

use serde_json::Value;

/// Render a scalar as a string. Integral numbers drop their fractional part
/// so `101` and `101.0` both become `"101"`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn number_to_string(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

pub fn opt_to_string(value: Option<&Value>) -> String {
    value.and_then(value_to_string).unwrap_or_default()
}

/// Truthiness for status flags.
pub fn value_to_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            !matches!(s.as_str(), "" | "0" | "false" | "no")
        }
        _ => false,
    }
}

pub fn value_to_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Collapse a scalar, a list or nothing into a list of codes.
pub fn value_to_codes(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<String> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(other).into_iter().collect(),
    };

    // Codes are kept verbatim: a blank or padded code names no course and
    // must keep its dependent blocked.
    let mut codes: Vec<String> = Vec::with_capacity(raw.len());
    for code in raw {
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_render_without_fraction() {
        assert_eq!(value_to_string(&json!(101)).as_deref(), Some("101"));
        assert_eq!(value_to_string(&json!(101.0)).as_deref(), Some("101"));
        assert_eq!(value_to_string(&json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(value_to_string(&json!(null)), None);
    }

    #[test]
    fn test_bool_coercion() {
        assert!(value_to_bool(Some(&json!(true))));
        assert!(value_to_bool(Some(&json!(1))));
        assert!(value_to_bool(Some(&json!("yes"))));
        assert!(!value_to_bool(Some(&json!("False"))));
        assert!(!value_to_bool(Some(&json!(""))));
        assert!(!value_to_bool(Some(&json!(0))));
        assert!(!value_to_bool(Some(&json!([true]))));
        assert!(!value_to_bool(None));
    }

    #[test]
    fn test_codes_from_mixed_shapes() {
        assert_eq!(value_to_codes(Some(&json!("101"))), vec!["101"]);
        assert_eq!(value_to_codes(Some(&json!(101))), vec!["101"]);
        assert!(value_to_codes(Some(&json!(null))).is_empty());
        assert!(value_to_codes(None).is_empty());
        assert_eq!(
            value_to_codes(Some(&json!(["101", 102, null, "101", " 101 ", ""]))),
            vec!["101", "102", " 101 ", ""]
        );
        assert_eq!(value_to_codes(Some(&json!(""))), vec![""]);
    }

    #[test]
    fn test_i64_coercion() {
        assert_eq!(value_to_i64(Some(&json!(3))), Some(3));
        assert_eq!(value_to_i64(Some(&json!("7"))), Some(7));
        assert_eq!(value_to_i64(Some(&json!("x"))), None);
    }
}
