use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::{NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;

/// Render a configured template, substituting `{{key}}` placeholders with
/// the node's inputs.
pub struct TemplateNode;

pub fn template_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("transform.template")
        .with_description("Render a template with {{key}} placeholders from inputs")
        .with_category("transform")
        .with_input(PortSpec::optional("in"))
        .with_output(PortSpec::required("text"))
}

#[async_trait]
impl NodeBehavior for TemplateNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let template = config
            .get("template")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration("missing 'template'".to_string()))?;

        let mut text = template.to_string();
        for (key, value) in inputs {
            text = text.replace(&format!("{{{{{key}}}}}"), &value.render());
        }
        // Placeholders in the input object are reachable by field name too.
        if let Some(Value::Object(fields)) = inputs.get("in") {
            for (key, value) in fields {
                text = text.replace(&format!("{{{{{key}}}}}"), &value.render());
            }
        }

        Ok(HashMap::from([("text".to_string(), Value::String(text))]))
    }
}

/// Extract a value at a dotted path from the input.
pub struct PickNode;

pub fn pick_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("transform.pick")
        .with_description("Extract a value at a dotted path, Null when absent")
        .with_category("transform")
        .with_input(PortSpec::required("value"))
        .with_output(PortSpec::required("value"))
}

#[async_trait]
impl NodeBehavior for PickNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let path = config
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration("missing 'path'".to_string()))?;
        let root = inputs
            .get("value")
            .ok_or_else(|| NodeError::MissingInput("value".to_string()))?;

        let mut current = root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => match map.get(segment) {
                    Some(next) => next,
                    None => {
                        return Ok(HashMap::from([("value".to_string(), Value::Null)]));
                    }
                },
                Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    Some(next) => next,
                    None => {
                        return Ok(HashMap::from([("value".to_string(), Value::Null)]));
                    }
                },
                _ => {
                    return Ok(HashMap::from([("value".to_string(), Value::Null)]));
                }
            };
        }

        Ok(HashMap::from([("value".to_string(), current.clone())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_substitutes_inputs() {
        let config = HashMap::from([(
            "template".to_string(),
            Value::from("Hello {{name}}, you have {{count}} messages"),
        )]);
        let inputs = HashMap::from([
            ("name".to_string(), Value::from("alice")),
            ("count".to_string(), Value::from(3i64)),
        ]);

        let out = TemplateNode.run(&config, &inputs).await.unwrap();
        assert_eq!(
            out["text"],
            Value::from("Hello alice, you have 3 messages")
        );
    }

    #[tokio::test]
    async fn template_reaches_into_input_object() {
        let config = HashMap::from([("template".to_string(), Value::from("hi {{user}}"))]);
        let inputs = HashMap::from([(
            "in".to_string(),
            Value::Object(HashMap::from([("user".to_string(), Value::from("bob"))])),
        )]);

        let out = TemplateNode.run(&config, &inputs).await.unwrap();
        assert_eq!(out["text"], Value::from("hi bob"));
    }

    #[tokio::test]
    async fn template_leaves_unknown_placeholders() {
        let config = HashMap::from([("template".to_string(), Value::from("{{missing}}"))]);
        let out = TemplateNode.run(&config, &HashMap::new()).await.unwrap();
        assert_eq!(out["text"], Value::from("{{missing}}"));
    }

    #[tokio::test]
    async fn pick_walks_objects_and_arrays() {
        let config = HashMap::from([("path".to_string(), Value::from("items.1.name"))]);
        let inputs = HashMap::from([(
            "value".to_string(),
            Value::Object(HashMap::from([(
                "items".to_string(),
                Value::Array(vec![
                    Value::Object(HashMap::from([("name".to_string(), Value::from("a"))])),
                    Value::Object(HashMap::from([("name".to_string(), Value::from("b"))])),
                ]),
            )])),
        )]);

        let out = PickNode.run(&config, &inputs).await.unwrap();
        assert_eq!(out["value"], Value::from("b"));
    }

    #[tokio::test]
    async fn pick_yields_null_for_absent_path() {
        let config = HashMap::from([("path".to_string(), Value::from("a.b.c"))]);
        let inputs = HashMap::from([("value".to_string(), Value::from("scalar"))]);
        let out = PickNode.run(&config, &inputs).await.unwrap();
        assert_eq!(out["value"], Value::Null);
    }
}
