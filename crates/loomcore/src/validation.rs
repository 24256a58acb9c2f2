//! Validation results, returned as data rather than raised.

use serde::Serialize;
use std::fmt;

/// One structural problem found in a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A node's type is not present in the registry.
    UnknownNodeType { node_id: String, node_type: String },
    /// An edge references a missing node or an undeclared port.
    DanglingEdge { edge_id: String, detail: String },
    /// A cycle through required edges, reported as the node sequence.
    Cycle { path: Vec<String> },
    /// A mandatory input port with no incoming edge.
    MissingRequiredInput { node_id: String, port: String },
    /// Two edges target the same input port that is not fan-in.
    DuplicateTarget { node_id: String, port: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownNodeType { node_id, node_type } => {
                write!(f, "node '{node_id}' has unknown type '{node_type}'")
            }
            ValidationError::DanglingEdge { edge_id, detail } => {
                write!(f, "edge '{edge_id}' is dangling: {detail}")
            }
            ValidationError::Cycle { path } => {
                write!(f, "cycle detected: {}", path.join(" -> "))
            }
            ValidationError::MissingRequiredInput { node_id, port } => {
                write!(f, "node '{node_id}' required input '{port}' has no incoming edge")
            }
            ValidationError::DuplicateTarget { node_id, port } => {
                write!(
                    f,
                    "multiple edges target non-fan-in port '{port}' of node '{node_id}'"
                )
            }
        }
    }
}

/// Outcome of validating a graph. Empty means the graph may execute.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "ok");
        }
        let rendered: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}
