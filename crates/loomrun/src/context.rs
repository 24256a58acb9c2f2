//! Per-run execution context.
//!
//! The single source of truth for a run's node states, read concurrently by
//! the scheduler and by subscribers. Writes are partitioned per node entry:
//! a node is dispatched once per attempt, so concurrent writers never touch
//! the same entry. Every transition is checked against the node state
//! machine and published to the event bus.

use chrono::{DateTime, Utc};
use loomcore::{
    EngineError, EventBus, Graph, NodeError, NodeState, NodeStatus, RunEvent, RunId, RunReport,
    RunStatus, Value,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RunContext {
    run_id: RunId,
    graph_id: String,
    started_at: DateTime<Utc>,
    finished_at: RwLock<Option<DateTime<Utc>>>,
    run_status: RwLock<RunStatus>,
    // Entry set is fixed at creation; only the values behind the locks move.
    states: HashMap<String, RwLock<NodeState>>,
    bus: Arc<EventBus>,
}

impl RunContext {
    pub fn new(run_id: RunId, graph: &Graph, bus: Arc<EventBus>) -> Self {
        let states = graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), RwLock::new(NodeState::default())))
            .collect();
        Self {
            run_id,
            graph_id: graph.id.clone(),
            started_at: Utc::now(),
            finished_at: RwLock::new(None),
            run_status: RwLock::new(RunStatus::Pending),
            states,
            bus,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn run_status(&self) -> RunStatus {
        *self.run_status.read()
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.states.get(node_id).map(|s| s.read().status)
    }

    pub fn node_state(&self, node_id: &str) -> Option<NodeState> {
        self.states.get(node_id).map(|s| s.read().clone())
    }

    pub fn start(&self) {
        *self.run_status.write() = RunStatus::Running;
        self.bus.emit(RunEvent::RunStarted {
            run_id: self.run_id,
            graph_id: self.graph_id.clone(),
            timestamp: Utc::now(),
        });
    }

    pub fn mark_ready(&self, node_id: &str) -> Result<(), EngineError> {
        self.transition(node_id, NodeStatus::Ready, |_| {})
    }

    /// Node moves to `Running` with its resolved inputs and attempt counter.
    pub fn record_dispatch(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        attempt: u32,
    ) -> Result<(), EngineError> {
        self.transition(node_id, NodeStatus::Running, |state| {
            state.inputs = inputs;
            state.attempt = attempt;
            state.error = None;
        })
    }

    pub fn record_success(
        &self,
        node_id: &str,
        output: HashMap<String, Value>,
    ) -> Result<(), EngineError> {
        self.transition(node_id, NodeStatus::Succeeded, |state| {
            state.output = output;
            state.error = None;
        })
    }

    pub fn record_failure(&self, node_id: &str, error: &NodeError) -> Result<(), EngineError> {
        self.transition(node_id, NodeStatus::Failed, |state| {
            state.error = Some(error.to_string());
        })
    }

    pub fn record_skipped(&self, node_id: &str) -> Result<(), EngineError> {
        self.transition(node_id, NodeStatus::Skipped, |_| {})
    }

    /// Recorded inputs of a node, reused when a failed attempt is retried.
    pub fn recorded_inputs(&self, node_id: &str) -> HashMap<String, Value> {
        self.states
            .get(node_id)
            .map(|s| s.read().inputs.clone())
            .unwrap_or_default()
    }

    fn transition(
        &self,
        node_id: &str,
        next: NodeStatus,
        apply: impl FnOnce(&mut NodeState),
    ) -> Result<(), EngineError> {
        let lock = self
            .states
            .get(node_id)
            .ok_or_else(|| EngineError::Execution(format!("unknown node '{node_id}' in run")))?;

        let event = {
            let mut state = lock.write();
            if !state.status.can_become(next) {
                return Err(EngineError::Execution(format!(
                    "illegal node transition for '{node_id}': {:?} -> {next:?}",
                    state.status
                )));
            }
            state.status = next;
            apply(&mut state);
            RunEvent::NodeStatusChanged {
                run_id: self.run_id,
                node_id: node_id.to_string(),
                status: state.status,
                output: (next == NodeStatus::Succeeded).then(|| state.output.clone()),
                error: state.error.clone(),
                timestamp: Utc::now(),
            }
        };
        self.bus.emit(event);
        Ok(())
    }

    /// Seal the run with its terminal status and publish the final event.
    pub fn finish(&self, status: RunStatus) {
        let now = Utc::now();
        *self.run_status.write() = status;
        *self.finished_at.write() = Some(now);
        let duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.bus.emit(RunEvent::RunFinished {
            run_id: self.run_id,
            status,
            duration_ms,
            timestamp: now,
        });
    }

    /// Point-in-time copy of the whole run, immutable once the run is done.
    pub fn snapshot(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            graph_id: self.graph_id.clone(),
            status: self.run_status(),
            started_at: self.started_at,
            finished_at: *self.finished_at.read(),
            node_states: self
                .states
                .iter()
                .map(|(id, s)| (id.clone(), s.read().clone()))
                .collect(),
        }
    }
}
