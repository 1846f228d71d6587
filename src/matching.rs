//! Response comparison for test cases.
//!
//! Two modes exist and they are intentionally different:
//!
//! - **exact**: the actual body is re-serialized compactly and compared as a
//!   string with the expected text (normalized the same way when it parses).
//!   Whitespace does not matter, key order does.
//! - **partial**: [`is_deep_subset`], a recursive containment check.

use serde_json::Value;

use crate::error::MatchError;

/// Whether `expected` is contained in `actual`.
///
/// Objects: every expected key must exist in `actual` with a subset-matching
/// value. Arrays: every expected element must match *some* actual element;
/// several expected elements may match the same actual one. Everything else
/// compares by value, with numbers compared numerically.
///
/// ```
/// use bistool::matching::is_deep_subset;
/// use serde_json::json;
///
/// assert!(is_deep_subset(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
/// assert!(!is_deep_subset(&json!({"a": 1, "c": 3}), &json!({"a": 1, "b": 2})));
/// assert!(is_deep_subset(&json!([{"a": 1}]), &json!([{"a": 1, "b": 2}, {"a": 9}])));
/// ```
pub fn is_deep_subset(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => expected.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|actual_value| is_deep_subset(value, actual_value))
        }),
        (Value::Array(expected), Value::Array(actual)) => expected
            .iter()
            .all(|wanted| actual.iter().any(|candidate| is_deep_subset(wanted, candidate))),
        (Value::Number(expected), Value::Number(actual)) => match (expected.as_f64(), actual.as_f64()) {
            (Some(e), Some(a)) => e == a,
            _ => expected == actual,
        },
        (Value::Object(_), _) | (Value::Array(_), _) => false,
        _ => expected == actual,
    }
}

/// Exact comparison of re-serialized JSON text.
pub fn exact_match(expected: &str, actual: &Value) -> bool {
    let expected = expected.trim();
    let normalized = serde_json::from_str::<Value>(expected)
        .ok()
        .and_then(|value| serde_json::to_string(&value).ok());
    let actual = actual.to_string();
    match normalized {
        Some(expected) => expected == actual,
        None => expected == actual,
    }
}

/// Compare a raw response body against a test's expectation.
///
/// An empty expectation matches anything without parsing the body.
pub fn response_matches(expected: &str, partial: bool, actual_body: &str) -> Result<bool, MatchError> {
    if expected.trim().is_empty() {
        return Ok(true);
    }
    let actual: Value = serde_json::from_str(actual_body).map_err(MatchError::ActualBody)?;
    if partial {
        let expected: Value = serde_json::from_str(expected).map_err(MatchError::ExpectedBody)?;
        Ok(is_deep_subset(&expected, &actual))
    } else {
        Ok(exact_match(expected, &actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_containment() {
        assert!(is_deep_subset(&json!({}), &json!({"a": 1})));
        assert!(is_deep_subset(&json!({"a": {"b": 1}}), &json!({"a": {"b": 1, "c": 2}})));
        assert!(!is_deep_subset(&json!({"a": {"b": 2}}), &json!({"a": {"b": 1}})));
        assert!(!is_deep_subset(&json!({"a": 1}), &json!([{"a": 1}])));
    }

    #[test]
    fn test_array_containment_is_existential() {
        assert!(is_deep_subset(&json!([]), &json!([1, 2])));
        assert!(is_deep_subset(&json!([2, 1]), &json!([1, 2, 3])));
        assert!(!is_deep_subset(&json!([4]), &json!([1, 2, 3])));
        assert!(!is_deep_subset(&json!([1]), &json!({"0": 1})));
    }

    #[test]
    fn test_array_matching_is_not_injective() {
        let expected = json!([{"a": 1}, {"a": 1}, {}]);
        let actual = json!([{"a": 1, "b": 2}]);
        assert!(is_deep_subset(&expected, &actual));
    }

    #[test]
    fn test_scalars() {
        assert!(is_deep_subset(&json!(1), &json!(1.0)));
        assert!(is_deep_subset(&json!("x"), &json!("x")));
        assert!(is_deep_subset(&Value::Null, &Value::Null));
        assert!(!is_deep_subset(&json!("1"), &json!(1)));
        assert!(!is_deep_subset(&Value::Null, &json!({})));
    }

    #[test]
    fn test_exact_match_is_whitespace_insensitive_and_order_sensitive() {
        let actual = json!({"a": 1, "b": [true]});
        assert!(exact_match("{\"a\":1,\"b\":[true]}", &actual));
        assert!(exact_match("{ \"a\": 1,\n  \"b\": [ true ] }", &actual));
        assert!(!exact_match("{\"b\":[true],\"a\":1}", &actual));
        assert!(!exact_match("{\"a\":1}", &actual));
    }

    #[test]
    fn test_exact_and_partial_modes_differ() {
        let body = "{\"a\":1,\"b\":2}";
        assert!(!response_matches("{\"a\":1}", false, body).unwrap());
        assert!(response_matches("{\"a\":1}", true, body).unwrap());
    }

    #[test]
    fn test_empty_expectation_skips_parsing() {
        assert!(response_matches("  ", false, "<html>").unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        assert!(matches!(
            response_matches("{\"a\":1}", true, "<html>"),
            Err(MatchError::ActualBody(_))
        ));
        assert!(matches!(
            response_matches("{a:1", true, "{}"),
            Err(MatchError::ExpectedBody(_))
        ));
        assert!(!response_matches("{a:1", false, "{}").unwrap());
    }
}
