use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type RunId = Uuid;

/// Per-node lifecycle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    /// Legal transitions of the node state machine. `Failed -> Running` is
    /// the retry path; `Pending -> Skipped` is branch resolution, never
    /// execution.
    pub fn can_become(self, next: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Failed, Running)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

/// Overall outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    PartiallyFailed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

/// Recorded state of one node within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub status: NodeStatus,
    /// Inputs resolved from upstream outputs at dispatch time.
    pub inputs: HashMap<String, Value>,
    /// Produced values keyed by output port, populated on success.
    pub output: HashMap<String, Value>,
    /// Populated only when the node terminally failed.
    pub error: Option<String>,
    /// Retry counter, 0 for the first attempt.
    pub attempt: u32,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            status: NodeStatus::Pending,
            inputs: HashMap::new(),
            output: HashMap::new(),
            error: None,
            attempt: 0,
        }
    }
}

/// Immutable record of a finished (or cancelled) run, kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub graph_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub node_states: HashMap<String, NodeState>,
}

impl RunReport {
    pub fn node(&self, node_id: &str) -> Option<&NodeState> {
        self.node_states.get(node_id)
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_states.get(node_id).map(|s| s.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_rules() {
        use NodeStatus::*;
        assert!(Pending.can_become(Ready));
        assert!(Pending.can_become(Skipped));
        assert!(Ready.can_become(Running));
        assert!(Running.can_become(Succeeded));
        assert!(Running.can_become(Failed));
        assert!(Failed.can_become(Running));

        assert!(!Pending.can_become(Running));
        assert!(!Skipped.can_become(Running));
        assert!(!Succeeded.can_become(Failed));
        assert!(!Ready.can_become(Skipped));
    }

    #[test]
    fn terminal_statuses() {
        assert!(NodeStatus::Skipped.is_terminal());
        assert!(!NodeStatus::Ready.is_terminal());
        assert!(RunStatus::PartiallyFailed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
