use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::{NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

/// Pause the branch for a configured duration, passing the input through.
pub struct DelayNode;

pub fn delay_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("time.delay")
        .with_description("Delay for 'delay_ms' milliseconds, then pass the input through")
        .with_category("time")
        .with_input(PortSpec::optional("in"))
        .with_output(PortSpec::required("out"))
}

#[async_trait]
impl NodeBehavior for DelayNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let delay_ms = config
            .get("delay_ms")
            .and_then(Value::as_f64)
            .unwrap_or(1000.0) as u64;

        tracing::debug!(delay_ms, "delaying");
        sleep(Duration::from_millis(delay_ms)).await;

        let value = inputs.get("in").cloned().unwrap_or(Value::Null);
        Ok(HashMap::from([("out".to_string(), value)]))
    }
}
