use async_trait::async_trait;
use loomcore::{NodeError, Value};
use loomrun::{NodeBehavior, NodeTypeSpec, PortSpec};
use std::collections::HashMap;

/// Issue an HTTP request and expose the response.
///
/// `url` and `method` come from config; an optional `body` input is sent as
/// JSON on POST/PUT. The response body is parsed as JSON when possible and
/// falls back to the raw text.
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

pub fn http_request_spec() -> NodeTypeSpec {
    NodeTypeSpec::new("http.request")
        .with_description("Make an HTTP request")
        .with_category("http")
        .with_input(PortSpec::optional("body"))
        .with_output(PortSpec::required("status"))
        .with_output(PortSpec::required("body"))
        .with_output(PortSpec::required("headers"))
}

#[async_trait]
impl NodeBehavior for HttpRequestNode {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration("missing 'url'".to_string()))?;
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");

        tracing::info!(%method, %url, "http request");

        let mut request = match method.to_uppercase().as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            other => {
                return Err(NodeError::Configuration(format!(
                    "unsupported method: {other}"
                )))
            }
        };

        if let Some(body) = inputs.get("body") {
            request = match body {
                Value::String(text) => request.body(text.clone()),
                other => request.json(other),
            };
        }

        if let Some(Value::Object(headers)) = config.get("headers") {
            for (key, value) in headers {
                request = request.header(key, value.render());
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("http request failed: {e}")))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    Value::String(v.to_str().unwrap_or("").to_string()),
                )
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("failed to read response: {e}")))?;

        tracing::debug!(status, "http response");

        let body = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Value::from_json(json),
            Err(_) => Value::String(text),
        };

        Ok(HashMap::from([
            ("status".to_string(), Value::from(status as i64)),
            ("body".to_string(), body),
            ("headers".to_string(), Value::Object(headers)),
        ]))
    }
}
