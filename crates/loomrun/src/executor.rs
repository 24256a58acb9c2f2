//! Single-node invocation: registry lookup, timeout, cancellation.
//!
//! The executor performs no I/O of its own; side effects live entirely in
//! the invoked behavior. A behavior that outlives its timeout is abandoned
//! and the node reports `Timeout`, freeing the slot for retry or skip
//! propagation.

use crate::registry::NodeRegistry;
use loomcore::{NodeError, NodeSpec, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct NodeExecutor {
    default_timeout_ms: u64,
}

impl NodeExecutor {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    /// Run one attempt of a node with its resolved inputs.
    ///
    /// Validation should have rejected unknown types already, but the lookup
    /// is re-checked here rather than trusted.
    pub async fn invoke(
        &self,
        registry: Arc<NodeRegistry>,
        node: NodeSpec,
        inputs: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<HashMap<String, Value>, NodeError> {
        let behavior = registry
            .behavior(&node.node_type)
            .ok_or_else(|| NodeError::UnknownNodeType(node.node_type.clone()))?;
        let timeout_ms = node.timeout_ms.unwrap_or(self.default_timeout_ms);

        let work = behavior.run(&node.config, &inputs);
        tokio::select! {
            _ = cancel.cancelled() => Err(NodeError::Cancelled),
            outcome = timeout(Duration::from_millis(timeout_ms), work) => match outcome {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout { timeout_ms }),
            },
        }
    }
}
