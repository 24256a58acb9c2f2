use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Port name used when an authored edge does not name a source handle.
pub const DEFAULT_OUTPUT_PORT: &str = "out";
/// Port name used when an authored edge does not name a target handle.
pub const DEFAULT_INPUT_PORT: &str = "in";

/// An authored workflow graph: typed nodes connected by directed edges.
///
/// A graph is an immutable snapshot once handed to the engine; editing a
/// graph means building a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes through the default ports.
    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.connect_ports(source, DEFAULT_OUTPUT_PORT, target, DEFAULT_INPUT_PORT);
    }

    pub fn connect_ports(
        &mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) {
        let id = format!("edge-{}", self.edges.len());
        self.edges.push(Edge {
            id,
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        });
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Indices of edges arriving at `node_id`, in declaration order.
    pub fn incoming(&self, node_id: &str) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.target == node_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of edges leaving `node_id`, in declaration order.
    pub fn outgoing(&self, node_id: &str) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == node_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Nodes with no incoming edges, typically triggers.
    pub fn entry_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .iter()
            .filter(|n| !self.edges.iter().any(|e| e.target == n.id))
            .collect()
    }
}

/// A single node in an authored graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque key/value configuration, interpreted by the node's behavior.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// How many times a failed attempt is retried. Default 0: side-effecting
    /// connectors must not be retried unless the author opts in.
    #[serde(default)]
    pub max_retries: u32,
    /// Per-node timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Marks this node's failure as non-fatal to the run.
    #[serde(default)]
    pub continue_on_failure: bool,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: None,
            config: HashMap::new(),
            max_retries: 0,
            timeout_ms: None,
            continue_on_failure: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }
}

/// A directed data link from one node's output port to another's input port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}
