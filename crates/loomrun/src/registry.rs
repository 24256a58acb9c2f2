use async_trait::async_trait;
use loomcore::{NodeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Declared input or output slot of a node type.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub name: String,
    pub required: bool,
    /// Multiple edges may converge on a fan-in port; the node receives the
    /// resolved values as an array in edge-declaration order.
    pub fan_in: bool,
}

impl PortSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            fan_in: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            fan_in: false,
        }
    }

    pub fn fan_in(mut self) -> Self {
        self.fan_in = true;
        self
    }
}

/// Whether a node type selects among its outgoing handles after it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Branching {
    /// All declared output handles are live on success.
    #[default]
    None,
    /// Exactly one of the `true`/`false` handles is live, decided by the
    /// node's configured comparison.
    Conditional,
}

/// Static description of a node type: its ports and branching semantics.
#[derive(Debug, Clone)]
pub struct NodeTypeSpec {
    pub node_type: String,
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub branching: Branching,
}

impl NodeTypeSpec {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            branching: Branching::None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_branching(mut self, branching: Branching) -> Self {
        self.branching = branching;
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Executable behavior of a node type.
///
/// Implementations are supplied by connector modules and may perform I/O;
/// the engine only ever hands them their config and resolved inputs and
/// reads back the produced port map.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    async fn run(
        &self,
        config: &HashMap<String, Value>,
        inputs: &HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, NodeError>;
}

struct RegistryEntry {
    spec: NodeTypeSpec,
    behavior: Arc<dyn NodeBehavior>,
}

/// Lookup table from node type string to declared ports and behavior.
#[derive(Default)]
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: NodeTypeSpec, behavior: Arc<dyn NodeBehavior>) {
        tracing::debug!(node_type = %spec.node_type, "registering node type");
        self.entries
            .insert(spec.node_type.clone(), RegistryEntry { spec, behavior });
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    pub fn spec(&self, node_type: &str) -> Option<&NodeTypeSpec> {
        self.entries.get(node_type).map(|e| &e.spec)
    }

    pub fn behavior(&self, node_type: &str) -> Option<Arc<dyn NodeBehavior>> {
        self.entries.get(node_type).map(|e| Arc::clone(&e.behavior))
    }

    pub fn node_types(&self) -> Vec<&NodeTypeSpec> {
        let mut specs: Vec<_> = self.entries.values().map(|e| &e.spec).collect();
        specs.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        specs
    }
}
