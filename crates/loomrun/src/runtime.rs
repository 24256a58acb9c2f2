//! Engine facade: validation gate, run startup, handles for polling,
//! subscription and cancellation.

use crate::context::RunContext;
use crate::executor::NodeExecutor;
use crate::registry::NodeRegistry;
use crate::scheduler::Scheduler;
use crate::validator;
use loomcore::{
    EngineError, EventBus, Graph, NodeState, NodeStatus, RunEvent, RunId, RunReport, RunStatus,
    Value,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Engine-level tunables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running nodes per run.
    pub max_parallel_nodes: usize,
    /// Timeout applied to nodes without their own `timeout_ms`.
    pub default_timeout_ms: u64,
    /// Capacity of the run event broadcast channel.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 16,
            default_timeout_ms: 30_000,
            event_capacity: 1024,
        }
    }
}

/// The workflow execution engine.
///
/// Holds the node registry and the event bus; each accepted graph runs as
/// its own isolated [`RunContext`] driven by the scheduler.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl Engine {
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: NodeRegistry, config: RuntimeConfig) -> Self {
        Self {
            bus: Arc::new(EventBus::new(config.event_capacity)),
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Subscribe to the status feed for all runs started by this engine.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.bus.subscribe()
    }

    /// Validate a graph without running it.
    pub fn validate(&self, graph: &Graph) -> loomcore::ValidationReport {
        validator::validate(graph, &self.registry)
    }

    /// Start executing a graph, returning a handle immediately.
    ///
    /// Validation failures abort synchronously; no node state is created and
    /// nothing executes.
    pub fn start(
        &self,
        graph: Graph,
        initial_inputs: HashMap<String, Value>,
    ) -> Result<RunHandle, EngineError> {
        let report = validator::validate(&graph, &self.registry);
        if !report.ok() {
            return Err(EngineError::Validation(report));
        }

        let run_id: RunId = Uuid::new_v4();
        let graph = Arc::new(graph);
        let context = Arc::new(RunContext::new(run_id, &graph, Arc::clone(&self.bus)));
        let cancel = CancellationToken::new();

        tracing::info!(%run_id, graph = %graph.name, "starting run");
        context.start();

        let scheduler = Scheduler::new(
            self.config.max_parallel_nodes,
            NodeExecutor::new(self.config.default_timeout_ms),
        );
        let task = {
            let graph = Arc::clone(&graph);
            let registry = Arc::clone(&self.registry);
            let context = Arc::clone(&context);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                scheduler
                    .run(graph, registry, context, initial_inputs, cancel)
                    .await
            })
        };

        Ok(RunHandle {
            run_id,
            context,
            cancel,
            task,
        })
    }

    /// Execute a graph to completion and return the final run report.
    pub async fn execute(
        &self,
        graph: Graph,
        initial_inputs: HashMap<String, Value>,
    ) -> Result<RunReport, EngineError> {
        self.start(graph, initial_inputs)?.wait().await
    }
}

/// Handle to a run in progress: poll node states, cancel, or await the end.
pub struct RunHandle {
    run_id: RunId,
    context: Arc<RunContext>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RunReport, EngineError>>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.context.run_status()
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.context.node_status(node_id)
    }

    pub fn node_state(&self, node_id: &str) -> Option<NodeState> {
        self.context.node_state(node_id)
    }

    /// Current snapshot of the whole run, also available mid-flight.
    pub fn snapshot(&self) -> RunReport {
        self.context.snapshot()
    }

    /// Signal every in-flight node to abandon and terminate the run as
    /// `Cancelled`. Outputs of already-succeeded nodes stay recorded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await the run's terminal state.
    pub async fn wait(self) -> Result<RunReport, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::Execution(format!("run task failed: {e}")))?
    }
}
