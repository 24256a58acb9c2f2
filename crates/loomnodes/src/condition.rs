use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::branch::{FALSE_HANDLE, TRUE_HANDLE};
use loomrun::{Branching, NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;

/// Two-way branch on a configured comparison.
///
/// The behavior only routes the incoming value onto both branch handles;
/// the engine's branch resolver evaluates the configured `operator` and
/// `compare_value` and delivers exactly one of them.
pub struct IfElseNode;

pub fn if_else_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("branch.if_else")
        .with_description("Route the input value down the true or false branch")
        .with_category("logic")
        .with_input(PortSpec::required("value"))
        .with_output(PortSpec::required(TRUE_HANDLE))
        .with_output(PortSpec::required(FALSE_HANDLE))
        .with_branching(Branching::Conditional)
}

#[async_trait]
impl NodeBehavior for IfElseNode {
    async fn run(
        &self,
        _config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let value = inputs
            .get("value")
            .cloned()
            .ok_or_else(|| NodeError::MissingInput("value".to_string()))?;
        Ok(HashMap::from([
            (TRUE_HANDLE.to_string(), value.clone()),
            (FALSE_HANDLE.to_string(), value),
        ]))
    }
}
