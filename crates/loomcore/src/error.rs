use crate::validation::ValidationReport;
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("graph failed validation: {0}")]
    Validation(ValidationReport),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while executing a single node.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Should be impossible once a graph has passed validation; the executor
    /// still guards against it rather than trusting the validator.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("branch resolution failed: {0}")]
    BranchResolution(String),

    #[error("cancelled")]
    Cancelled,
}

/// Structural errors raised while working with a graph at run time.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("cyclic dependency detected")]
    CyclicDependency,
}
