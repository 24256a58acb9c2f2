//! Branch resolution for conditional nodes.
//!
//! After a node succeeds, the scheduler asks which of its outgoing handles
//! are live. Non-branching nodes light up every declared handle; a
//! conditional node evaluates its configured comparison and lights exactly
//! one of `true`/`false`. An operator the resolver does not recognize fails
//! the node instead of silently picking a default branch.

use crate::registry::{Branching, NodeTypeSpec};
use loomcore::{NodeError, Value};
use std::collections::{HashMap, HashSet};

/// Handle taken when the configured comparison holds.
pub const TRUE_HANDLE: &str = "true";
/// Handle taken when the configured comparison does not hold.
pub const FALSE_HANDLE: &str = "false";

const CONFIG_OPERATOR: &str = "operator";
const CONFIG_COMPARE_VALUE: &str = "compare_value";

/// Determine which outgoing handles of a completed node are live.
pub fn resolve_live_handles(
    spec: &NodeTypeSpec,
    config: &HashMap<String, Value>,
    outputs: &HashMap<String, Value>,
) -> Result<HashSet<String>, NodeError> {
    match spec.branching {
        Branching::None => Ok(spec.outputs.iter().map(|p| p.name.clone()).collect()),
        Branching::Conditional => {
            // A conditional behavior emits the routed value on both branch
            // ports; resolution decides which one is delivered.
            let value = outputs
                .get(TRUE_HANDLE)
                .or_else(|| outputs.get(FALSE_HANDLE))
                .unwrap_or(&Value::Null);
            let operator = config
                .get(CONFIG_OPERATOR)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    NodeError::BranchResolution("conditional node missing 'operator'".to_string())
                })?;
            let compare = config.get(CONFIG_COMPARE_VALUE);

            let passed = evaluate(operator, value, compare)?;
            let live = if passed { TRUE_HANDLE } else { FALSE_HANDLE };
            Ok(HashSet::from([live.to_string()]))
        }
    }
}

/// Evaluate a comparison operator against a value.
pub fn evaluate(
    operator: &str,
    value: &Value,
    compare: Option<&Value>,
) -> Result<bool, NodeError> {
    match operator {
        "equals" => Ok(loose_eq(value, require(operator, compare)?)),
        "not_equals" => Ok(!loose_eq(value, require(operator, compare)?)),
        "greater_than" => numeric(operator, value, compare, |a, b| a > b),
        "greater_than_or_equal" => numeric(operator, value, compare, |a, b| a >= b),
        "less_than" => numeric(operator, value, compare, |a, b| a < b),
        "less_than_or_equal" => numeric(operator, value, compare, |a, b| a <= b),
        "contains" => {
            let target = require(operator, compare)?;
            Ok(match (value, target) {
                (Value::String(s), Value::String(t)) => s.contains(t.as_str()),
                (Value::String(s), Value::Number(n)) => s.contains(&Value::Number(*n).render()),
                (Value::Array(items), target) => items.contains(target),
                _ => false,
            })
        }
        "starts_with" => {
            let target = require(operator, compare)?;
            Ok(matches!((value, target), (Value::String(s), Value::String(t)) if s.starts_with(t.as_str())))
        }
        "ends_with" => {
            let target = require(operator, compare)?;
            Ok(matches!((value, target), (Value::String(s), Value::String(t)) if s.ends_with(t.as_str())))
        }
        "is_empty" => Ok(is_empty(value)),
        "is_not_empty" => Ok(!is_empty(value)),
        other => Err(NodeError::BranchResolution(format!(
            "unknown operator '{other}'"
        ))),
    }
}

fn require<'a>(operator: &str, compare: Option<&'a Value>) -> Result<&'a Value, NodeError> {
    compare.ok_or_else(|| {
        NodeError::BranchResolution(format!("operator '{operator}' requires compare_value"))
    })
}

fn numeric(
    operator: &str,
    value: &Value,
    compare: Option<&Value>,
    cmp: fn(f64, f64) -> bool,
) -> Result<bool, NodeError> {
    let target = require(operator, compare)?;
    match (as_number(value), as_number(target)) {
        (Some(a), Some(b)) => Ok(cmp(a, b)),
        // Non-numeric operands compare false, matching the canvas product's
        // NaN comparison semantics.
        _ => Ok(false),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Loose equality with numeric and boolean/string coercion.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    match (a, b) {
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            match s.to_lowercase().as_str() {
                "true" => *x,
                "false" => !*x,
                _ => false,
            }
        }
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => *n == 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{NodeTypeSpec, PortSpec};

    fn conditional_spec() -> NodeTypeSpec {
        NodeTypeSpec::new("branch.if_else")
            .with_input(PortSpec::required("value"))
            .with_output(PortSpec::required(TRUE_HANDLE))
            .with_output(PortSpec::required(FALSE_HANDLE))
            .with_branching(Branching::Conditional)
    }

    #[test]
    fn non_branching_node_lights_all_handles() {
        let spec = NodeTypeSpec::new("emit")
            .with_output(PortSpec::required("out"))
            .with_output(PortSpec::required("aux"));
        let live = resolve_live_handles(&spec, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(live.len(), 2);
        assert!(live.contains("out") && live.contains("aux"));
    }

    #[test]
    fn conditional_selects_exactly_one_branch() {
        let spec = conditional_spec();
        let config = HashMap::from([
            ("operator".to_string(), Value::from("equals")),
            ("compare_value".to_string(), Value::from("x")),
        ]);
        let outputs = HashMap::from([
            (TRUE_HANDLE.to_string(), Value::from("x")),
            (FALSE_HANDLE.to_string(), Value::from("x")),
        ]);

        let live = resolve_live_handles(&spec, &config, &outputs).unwrap();
        assert_eq!(live, HashSet::from([TRUE_HANDLE.to_string()]));

        let outputs = HashMap::from([
            (TRUE_HANDLE.to_string(), Value::from("y")),
            (FALSE_HANDLE.to_string(), Value::from("y")),
        ]);
        let live = resolve_live_handles(&spec, &config, &outputs).unwrap();
        assert_eq!(live, HashSet::from([FALSE_HANDLE.to_string()]));
    }

    #[test]
    fn unknown_operator_fails_resolution() {
        let err = evaluate("spaceship", &Value::from(1i64), Some(&Value::from(2i64)))
            .expect_err("unknown operator must fail");
        assert!(matches!(err, NodeError::BranchResolution(msg) if msg.contains("spaceship")));
    }

    #[test]
    fn missing_compare_value_fails() {
        let err = evaluate("equals", &Value::from(1i64), None).expect_err("must fail");
        assert!(matches!(err, NodeError::BranchResolution(_)));
    }

    #[test]
    fn numeric_operators_coerce_strings() {
        assert!(evaluate("greater_than", &Value::from("10"), Some(&Value::from(9i64))).unwrap());
        assert!(evaluate("less_than_or_equal", &Value::from(3i64), Some(&Value::from("3"))).unwrap());
        // Non-numeric operands compare false rather than erroring.
        assert!(!evaluate("greater_than", &Value::from("abc"), Some(&Value::from(1i64))).unwrap());
    }

    #[test]
    fn loose_equality_crosses_types() {
        assert!(evaluate("equals", &Value::from("42"), Some(&Value::from(42i64))).unwrap());
        assert!(evaluate("equals", &Value::from(true), Some(&Value::from("true"))).unwrap());
        assert!(evaluate("not_equals", &Value::from("a"), Some(&Value::from("b"))).unwrap());
    }

    #[test]
    fn string_and_array_operators() {
        assert!(evaluate("contains", &Value::from("hello world"), Some(&Value::from("world"))).unwrap());
        let arr = Value::Array(vec![Value::from(1i64), Value::from(2i64)]);
        assert!(evaluate("contains", &arr, Some(&Value::from(2i64))).unwrap());
        assert!(evaluate("starts_with", &Value::from("loom"), Some(&Value::from("lo"))).unwrap());
        assert!(evaluate("ends_with", &Value::from("loom"), Some(&Value::from("om"))).unwrap());
    }

    #[test]
    fn emptiness_operators_need_no_compare_value() {
        assert!(evaluate("is_empty", &Value::Null, None).unwrap());
        assert!(evaluate("is_empty", &Value::from(""), None).unwrap());
        assert!(evaluate("is_not_empty", &Value::from("x"), None).unwrap());
        assert!(!evaluate("is_not_empty", &Value::Array(vec![]), None).unwrap());
    }
}
