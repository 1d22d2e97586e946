use serde_json::Value;

use crate::action::ActionSpec;
use crate::handler::HandlerSpec;

/// Selects the actions of every pattern equal to `target`, in declaration
/// order. Values of different JSON types never match (`1` is not `"1"`),
/// numbers compare by value (`1` is `1.0`).
#[must_use]
pub fn dispatch<'a>(handler: &'a HandlerSpec, target: &Value) -> Vec<&'a ActionSpec> {
    handler
        .patterns()
        .iter()
        .filter(|(pattern, _)| same_value(pattern, target))
        .flat_map(|(_, actions)| actions)
        .collect()
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                left == right
            } else if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
                left == right
            } else {
                left.as_f64() == right.as_f64()
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(l, r)| same_value(l, r))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, l)| right.get(key).is_some_and(|r| same_value(l, r)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mqtt_cmd_messaging::{Message, QoS};
    use serde_json::json;

    use crate::extract::extract;
    use crate::render::Renderer;
    use crate::test_support::handler;

    const ON_OFF: &str = r#"
patterns:
  "on":
    - {request: {url: "http://localhost/on"}}
  "off":
    - {request: {url: "http://localhost/off"}}
    - {command: {args: ["true"]}}
"#;

    #[test]
    fn test_only_equal_pattern_fires() {
        let spec = handler(ON_OFF);

        let kinds: Vec<_> = dispatch(&spec, &json!("off"))
            .into_iter()
            .map(ActionSpec::kind)
            .collect();
        assert_eq!(kinds, vec!["request", "command"]);
        assert_eq!(dispatch(&spec, &json!("on")).len(), 1);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(dispatch(&handler(ON_OFF), &json!("toggle")).is_empty());
    }

    #[test]
    fn test_types_are_distinct() {
        let spec = handler(
            r#"
jq_query: .x
patterns:
  1: [{command: {args: ["true"]}}]
  "1": [{request: {url: "http://localhost"}}, {request: {url: "http://localhost"}}]
"#,
        );

        assert_eq!(dispatch(&spec, &json!(1)).len(), 1);
        assert_eq!(dispatch(&spec, &json!("1")).len(), 2);
        assert!(dispatch(&spec, &json!(1.5)).is_empty());
        assert!(dispatch(&spec, &json!(true)).is_empty());
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let spec = handler(
            r#"
jq_query: .x
patterns:
  1: [{command: {args: ["true"]}}]
  2.5: [{command: {args: ["true"]}}]
"#,
        );

        assert_eq!(dispatch(&spec, &json!(1.0)).len(), 1);
        assert_eq!(dispatch(&spec, &json!(1)).len(), 1);
        assert_eq!(dispatch(&spec, &json!(2.5)).len(), 1);
        assert!(dispatch(&spec, &json!(-1)).is_empty());
    }

    #[test]
    fn test_float_query_result_fires_integer_pattern() {
        let spec = handler(
            r#"
jq_query: .x / 2
patterns:
  1: [{command: {args: ["true"]}}]
"#,
        );
        let message = Message::new("a/b", r#"{"x": 2}"#, QoS::AtMostOnce);

        let extracted = extract(&spec, &message, "router", &Renderer::new()).unwrap();

        assert_eq!(dispatch(&spec, &extracted.target).len(), 1);
    }

    #[test]
    fn test_nested_numbers_compare_by_value() {
        assert!(same_value(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2.0}])));
        assert!(!same_value(&json!([1, {"a": 2}]), &json!([1, {"a": "2"}])));
        assert!(!same_value(&json!({"a": 1}), &json!({"b": 1})));
    }
}
