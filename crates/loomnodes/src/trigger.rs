use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::{NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;

/// Entry point for manually started runs.
///
/// Emits a `payload` object built from the configured payload, with the
/// run's initial inputs merged over it. With neither, the payload is an
/// empty object.
pub struct ManualTriggerNode;

pub fn manual_trigger_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("trigger.manual")
        .with_description("Start a run with a manually supplied payload")
        .with_category("trigger")
        .with_output(PortSpec::required("payload"))
}

#[async_trait]
impl NodeBehavior for ManualTriggerNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let mut payload = match config.get("payload") {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(NodeError::Configuration(format!(
                    "payload must be an object, got {}",
                    other.type_name()
                )))
            }
            None => HashMap::new(),
        };
        for (key, value) in inputs {
            payload.insert(key.clone(), value.clone());
        }
        Ok(HashMap::from([(
            "payload".to_string(),
            Value::Object(payload),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_inputs_override_configured_payload() {
        let config = HashMap::from([(
            "payload".to_string(),
            Value::Object(HashMap::from([
                ("env".to_string(), Value::from("prod")),
                ("user".to_string(), Value::from("default")),
            ])),
        )]);
        let inputs = HashMap::from([("user".to_string(), Value::from("alice"))]);

        let out = ManualTriggerNode.run(&config, &inputs).await.unwrap();
        let payload = out["payload"].as_object().unwrap();
        assert_eq!(payload["env"], Value::from("prod"));
        assert_eq!(payload["user"], Value::from("alice"));
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let config = HashMap::from([("payload".to_string(), Value::from(5i64))]);
        let err = ManualTriggerNode
            .run(&config, &HashMap::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, NodeError::Configuration(_)));
    }
}
