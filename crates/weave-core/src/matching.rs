//! Structural equality used to pair permission records with tool calls.

use serde_json::Value;

/// Compares two parsed argument trees.
///
/// Objects match when they hold the same keys with structurally equal values,
/// independent of key order. Numbers match by numeric value, so `1` and `1.0`
/// are equal. `null` only equals `null`.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| deep_equal(a, b)))
        }
        _ => false,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// True when a tool call and a permission record describe the same invocation.
pub fn same_invocation(name: &str, input: &Value, other_name: &str, other_input: &Value) -> bool {
    name == other_name && deep_equal(input, other_input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::nulls(json!(null), json!(null), true)]
    #[case::null_vs_object(json!(null), json!({}), false)]
    #[case::int_vs_float(json!(1), json!(1.0), true)]
    #[case::different_numbers(json!(1), json!(2), false)]
    #[case::negative(json!(-3), json!(-3.0), true)]
    #[case::strings(json!("ls"), json!("ls"), true)]
    #[case::string_vs_number(json!("1"), json!(1), false)]
    #[case::array_order_matters(json!([1, 2]), json!([2, 1]), false)]
    #[case::array_length(json!([1]), json!([1, 1]), false)]
    #[case::key_order(
        json!({"command": "ls", "timeout": 5}),
        json!({"timeout": 5, "command": "ls"}),
        true
    )]
    #[case::extra_key(json!({"a": 1}), json!({"a": 1, "b": null}), false)]
    #[case::nested(
        json!({"edits": [{"old": "a", "new": "b"}]}),
        json!({"edits": [{"new": "b", "old": "a"}]}),
        true
    )]
    fn test_deep_equal(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
        assert_eq!(deep_equal(&a, &b), expected);
        assert_eq!(deep_equal(&b, &a), expected);
    }

    #[test]
    fn test_same_invocation_requires_name_match() {
        let input = json!({"command": "ls"});
        assert!(same_invocation("Bash", &input, "Bash", &input));
        assert!(!same_invocation("Bash", &input, "Shell", &input));
    }
}
