use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::{NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;

/// Log the incoming value at info level and pass it through unchanged.
pub struct LogNode;

pub fn log_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("debug.log")
        .with_description("Log the input value and pass it through")
        .with_category("debug")
        .with_input(PortSpec::optional("in"))
        .with_output(PortSpec::required("out"))
}

#[async_trait]
impl NodeBehavior for LogNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let label = config
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("debug.log");
        let value = inputs.get("in").cloned().unwrap_or(Value::Null);

        tracing::info!(%label, value = %value.render(), "log node");

        Ok(HashMap::from([("out".to_string(), value)]))
    }
}
