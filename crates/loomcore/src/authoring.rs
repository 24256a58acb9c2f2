//! Loader for the canvas authoring format.
//!
//! The visual editor persists graphs as React-Flow style documents:
//! `{nodes: [{id, type, position, data: {config}}], edges: [{id?, source,
//! sourceHandle?, target, targetHandle?}]}`. The loader normalizes that shape
//! into [`Graph`]: positions are dropped, omitted handles become the explicit
//! default port names, and missing edge ids are synthesized.

use crate::graph::{Edge, Graph, NodeSpec, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};
use crate::{EngineError, Value};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<CanvasNode>,
    pub edges: Vec<CanvasEdge>,
}

#[derive(Debug, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Canvas coordinates. Parsed so authored files round-trip, ignored by
    /// the engine.
    #[serde(default)]
    #[allow(dead_code)]
    position: Option<CanvasPosition>,
    #[serde(default)]
    pub data: CanvasNodeData,
}

#[derive(Debug, Deserialize)]
struct CanvasPosition {
    #[allow(dead_code)]
    x: f64,
    #[allow(dead_code)]
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNodeData {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub continue_on_failure: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasEdge {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl CanvasDocument {
    pub fn into_graph(self) -> Graph {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| NodeSpec {
                id: n.id,
                node_type: n.node_type,
                name: n.data.label,
                config: n
                    .data
                    .config
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
                max_retries: n.data.max_retries,
                timeout_ms: n.data.timeout_ms,
                continue_on_failure: n.data.continue_on_failure,
            })
            .collect();

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, e)| Edge {
                id: e.id.unwrap_or_else(|| format!("edge-{i}")),
                source: e.source,
                source_handle: e
                    .source_handle
                    .unwrap_or_else(|| DEFAULT_OUTPUT_PORT.to_string()),
                target: e.target,
                target_handle: e
                    .target_handle
                    .unwrap_or_else(|| DEFAULT_INPUT_PORT.to_string()),
            })
            .collect();

        Graph {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name.unwrap_or_else(|| "untitled".to_string()),
            nodes,
            edges,
        }
    }
}

/// Parse a canvas JSON document into a normalized [`Graph`].
pub fn parse_canvas(json: &str) -> Result<Graph, EngineError> {
    let doc: CanvasDocument = serde_json::from_str(json)?;
    Ok(doc.into_graph())
}
